use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use savedq_core::location::{Location, LocationSink, MemoryLocation};
use savedq_core::name_edit::{
    CommitOutcome, NameEditController, NameEditError, NameFieldProps, NoOpReason,
};
use savedq_core::notifications::{NoticeLevel, NotificationLog};
use savedq_core::query_view::{QueryView, Sort, NAME_DEFAULT};
use savedq_core::saved_query::{Organization, SavedQueryRecord};
use savedq_core::saved_query_api::{
    AnnouncingUpdater, ApiError, SavedQueryLister, SavedQueryUpdater,
};
use thiserror::Error;

mod inline_input;

pub use inline_input::{FocusRequest, InlineInput};

const TICK_RATE: Duration = Duration::from_millis(120);

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the screen needs from a saved-query backend.
pub trait SavedQueryService: SavedQueryUpdater + SavedQueryLister {}

impl<T: SavedQueryUpdater + SavedQueryLister + ?Sized> SavedQueryService for T {}

pub struct TuiOptions {
    pub api: Arc<dyn SavedQueryService>,
    pub organization: Organization,
    pub results_path: String,
}

type Controller = NameEditController<
    AnnouncingUpdater<Arc<dyn SavedQueryService>, NotificationLog>,
    NotificationLog,
    MemoryLocation,
>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Reload,
    CommitName {
        raw: String,
        view: QueryView,
        saved_queries: Vec<SavedQueryRecord>,
    },
}

#[derive(Debug)]
enum AppEvent {
    Listed(Result<Vec<SavedQueryRecord>, ApiError>),
    CommitFinished(Result<CommitOutcome, NameEditError>),
    RefreshRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditTarget {
    Name,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionKey {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    Navigate(DirectionKey),
    EditName,
    EditFilter,
    Reload,
    Input(char),
    Backspace,
    Commit,
    Revert,
    Tick,
}

#[derive(Debug)]
struct TuiApp {
    saved_queries: Vec<SavedQueryRecord>,
    loaded: bool,
    selected_index: usize,
    view: QueryView,
    name_input: InlineInput,
    filter_input: InlineInput,
    editing: Option<EditTarget>,
    pending_commits: usize,
    show_help: bool,
    should_quit: bool,
    status_line: String,
    notices: NotificationLog,
    location: MemoryLocation,
    focus: FocusRequest,
}

impl TuiApp {
    fn new(notices: NotificationLog, location: MemoryLocation, focus: FocusRequest) -> Self {
        let view = QueryView::new_query();
        Self {
            saved_queries: Vec::new(),
            loaded: false,
            selected_index: 0,
            name_input: InlineInput::from_props(&NameFieldProps::for_view(&view)),
            filter_input: InlineInput::with_value(view.query.clone()),
            view,
            editing: None,
            pending_commits: 0,
            show_help: false,
            should_quit: false,
            status_line: "Loading saved queries...".to_string(),
            notices,
            location,
            focus,
        }
    }

    fn handle(&mut self, msg: Msg) -> Option<Command> {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::EditName => self.begin_edit(EditTarget::Name),
            Msg::EditFilter => self.begin_edit(EditTarget::Filter),
            Msg::Reload => {
                self.status_line = "Reloading saved queries...".to_string();
                return Some(Command::Reload);
            }
            Msg::Input(ch) => {
                if let Some(input) = self.active_input() {
                    input.insert(ch);
                }
            }
            Msg::Backspace => {
                if let Some(input) = self.active_input() {
                    input.backspace();
                }
            }
            Msg::Commit => return self.finish_edit(false),
            Msg::Revert => return self.finish_edit(true),
            Msg::Tick => self.on_tick(),
        }
        None
    }

    fn on_tick(&mut self) {
        if self.focus.take() && self.name_input.focus() {
            self.editing = Some(EditTarget::Name);
        }
    }

    fn active_input(&mut self) -> Option<&mut InlineInput> {
        match self.editing? {
            EditTarget::Name => Some(&mut self.name_input),
            EditTarget::Filter => Some(&mut self.filter_input),
        }
    }

    fn begin_edit(&mut self, target: EditTarget) {
        let focused = match target {
            EditTarget::Name => self.name_input.focus(),
            EditTarget::Filter => self.filter_input.focus(),
        };
        if focused {
            self.editing = Some(target);
            self.status_line = "Enter/Tab to save, Esc to revert".to_string();
        } else {
            self.status_line = "Save this query before renaming it".to_string();
        }
    }

    fn finish_edit(&mut self, revert: bool) -> Option<Command> {
        let target = self.editing.take()?;
        match target {
            EditTarget::Name => {
                let raw = if revert {
                    self.name_input.revert()
                } else {
                    self.name_input.blur()
                }?;
                self.pending_commits += 1;
                self.status_line = "Saving name...".to_string();
                Some(Command::CommitName {
                    raw,
                    view: self.view.clone(),
                    saved_queries: self.saved_queries.clone(),
                })
            }
            EditTarget::Filter => {
                let text = if revert {
                    self.filter_input.revert()
                } else {
                    self.filter_input.blur()
                }?;
                if text != self.view.query {
                    self.view = self.view.with_query(text);
                    self.sync_location();
                    self.status_line = "Filter changed (not saved)".to_string();
                }
                None
            }
        }
    }

    fn navigate(&mut self, direction: DirectionKey) {
        let max_index = self.saved_queries.len();
        let next = match direction {
            DirectionKey::Up => self.selected_index.saturating_sub(1),
            DirectionKey::Down => (self.selected_index + 1).min(max_index),
        };
        self.select(next);
    }

    fn select(&mut self, index: usize) {
        self.selected_index = index.min(self.saved_queries.len());
        let view = self
            .saved_queries
            .get(self.selected_index)
            .map_or_else(QueryView::new_query, QueryView::from_record);
        self.show_view(view);
        self.sync_location();
        self.status_line = format!("Selected `{}`", self.view.display_name());
    }

    fn show_view(&mut self, view: QueryView) {
        self.name_input = InlineInput::from_props(&NameFieldProps::for_view(&view));
        self.filter_input = InlineInput::with_value(view.query.clone());
        self.editing = None;
        self.view = view;
    }

    /// List position of the shown view; the "new query" row when it is
    /// unsaved, and the nearest valid row when it was removed.
    fn index_of_current_view(&self) -> usize {
        let new_query_row = self.saved_queries.len();
        match self.view.id.as_deref() {
            None => new_query_row,
            Some(id) => self
                .saved_queries
                .iter()
                .position(|record| record.id == id)
                .unwrap_or_else(|| self.selected_index.min(new_query_row)),
        }
    }

    fn sync_location(&self) {
        let pathname = self.location.pathname();
        self.location
            .replace(&pathname, self.view.to_query_string_params());
    }

    fn apply_event(&mut self, app_event: AppEvent) -> Option<Command> {
        match app_event {
            AppEvent::Listed(Ok(records)) => {
                self.saved_queries = records;
                if self.loaded {
                    self.selected_index = self.index_of_current_view();
                    self.status_line =
                        format!("Loaded {} saved queries", self.saved_queries.len());
                } else {
                    self.loaded = true;
                    self.select(0);
                }
            }
            AppEvent::Listed(Err(error)) => {
                self.status_line = format!("Failed to load saved queries: {error}");
            }
            AppEvent::RefreshRequested => return Some(Command::Reload),
            AppEvent::CommitFinished(result) => {
                self.pending_commits = self.pending_commits.saturating_sub(1);
                self.apply_commit(result);
            }
        }
        None
    }

    fn apply_commit(&mut self, result: Result<CommitOutcome, NameEditError>) {
        match result {
            Ok(CommitOutcome::Renamed { record, view, .. }) => {
                if let Some(cached) = self
                    .saved_queries
                    .iter_mut()
                    .find(|cached| cached.id == record.id)
                {
                    *cached = record;
                }
                if view.id == self.view.id {
                    self.status_line = format!("Renamed to `{}`", view.display_name());
                    self.show_view(view);
                }
            }
            Ok(CommitOutcome::Rejected) => {
                self.status_line = "A name is required".to_string();
            }
            Ok(CommitOutcome::Unchanged(reason)) => {
                self.status_line = match reason {
                    NoOpReason::Unsaved => "Unsaved query, nothing to rename",
                    NoOpReason::UnknownQuery => "Query is not in the saved list",
                    NoOpReason::SameName => "Name unchanged",
                }
                .to_string();
            }
            Err(error) => {
                tracing::warn!(%error, "rename failed");
                self.status_line = format!("Rename failed: {error}");
            }
        }
    }
}

#[must_use]
pub fn ui_name() -> &'static str {
    "savedq-tui"
}

pub fn run(options: TuiOptions) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &runtime, options);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

struct Dispatcher<'a> {
    runtime: &'a tokio::runtime::Runtime,
    api: Arc<dyn SavedQueryService>,
    controller: Arc<Controller>,
    focus: FocusRequest,
    events: Sender<AppEvent>,
}

impl Dispatcher<'_> {
    fn dispatch(&self, command: Command) {
        match command {
            Command::Reload => {
                let api = Arc::clone(&self.api);
                let organization = self.controller.organization().clone();
                let events = self.events.clone();
                self.runtime.spawn(async move {
                    let listed = api.list_saved_queries(&organization).await;
                    let _ = events.send(AppEvent::Listed(listed));
                });
            }
            Command::CommitName {
                raw,
                view,
                saved_queries,
            } => {
                tracing::debug!(id = ?view.id, "dispatching name commit");
                let controller = Arc::clone(&self.controller);
                let focus = self.focus.clone();
                let events = self.events.clone();
                self.runtime.spawn(async move {
                    let refresh = events.clone();
                    let listener = move |_: &SavedQueryRecord| {
                        let _ = refresh.send(AppEvent::RefreshRequested);
                    };
                    let result = controller
                        .on_name_committed(&raw, &view, &saved_queries, &focus, &listener)
                        .await;
                    let _ = events.send(AppEvent::CommitFinished(result));
                });
            }
        }
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &tokio::runtime::Runtime,
    options: TuiOptions,
) -> Result<(), TuiError> {
    let notices = NotificationLog::new();
    let location = MemoryLocation::new(Location::new(options.results_path));
    let focus = FocusRequest::new();
    let controller = Arc::new(NameEditController::new(
        AnnouncingUpdater::new(Arc::clone(&options.api), notices.clone()),
        notices.clone(),
        location.clone(),
        options.organization,
    ));
    let (events, inbox): (Sender<AppEvent>, Receiver<AppEvent>) = mpsc::channel();
    let dispatcher = Dispatcher {
        runtime,
        api: options.api,
        controller,
        focus: focus.clone(),
        events,
    };

    let mut app = TuiApp::new(notices, location, focus);
    dispatcher.dispatch(Command::Reload);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key, app.editing.is_some()) {
                        if let Some(command) = app.handle(message) {
                            dispatcher.dispatch(command);
                        }
                    }
                }
            }
        }

        while let Ok(app_event) = inbox.try_recv() {
            if let Some(command) = app.apply_event(app_event) {
                dispatcher.dispatch(command);
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.handle(Msg::Tick);
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_name_header(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[1]);

    let mut entries: Vec<Line<'_>> = app
        .saved_queries
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let marker = if index == app.selected_index { ">" } else { " " };
            let name = if record.name.is_empty() {
                NAME_DEFAULT
            } else {
                record.name.as_str()
            };
            Line::from(format!("{marker} {name}"))
        })
        .collect();
    let new_marker = if app.selected_index == app.saved_queries.len() {
        ">"
    } else {
        " "
    };
    entries.push(Line::from(format!("{new_marker} + New query")));
    let list = Paragraph::new(entries)
        .block(Block::default().borders(Borders::ALL).title("Saved Queries"));
    frame.render_widget(list, columns[0]);

    let view = &app.view;
    let sorts = view
        .sorts
        .iter()
        .map(Sort::encode)
        .collect::<Vec<_>>()
        .join(", ");
    let filter_label = if app.editing == Some(EditTarget::Filter) {
        format!("{}_", app.filter_input.value())
    } else {
        app.filter_input.value().to_string()
    };
    let details = Paragraph::new(vec![
        Line::from(format!("Columns: {}", view.fields.join(", "))),
        Line::from(format!("Sort: {sorts}")),
        Line::from(format!("Filter: {filter_label}")),
        Line::from(format!(
            "Period: {}",
            view.stats_period.as_deref().unwrap_or_else(|| {
                if view.start.is_some() {
                    "absolute"
                } else {
                    "-"
                }
            })
        )),
        Line::from(format!(
            "Projects: {}",
            view.project
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Query"))
    .alignment(Alignment::Left);
    frame.render_widget(details, columns[1]);

    let notice_line = match app.notices.latest() {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(notice.message, Style::default().fg(color)))
        }
        None => Line::from(""),
    };
    let footer = Paragraph::new(vec![
        Line::from(format!("URL: {}", app.location.current().to_url())),
        notice_line,
        Line::from(format!(
            "Status: {}{}",
            app.status_line,
            if app.pending_commits > 0 {
                format!(" ({} saving)", app.pending_commits)
            } else {
                String::new()
            }
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Location"));
    frame.render_widget(footer, rows[2]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_name_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let input = &app.name_input;
    let style = if input.is_disabled() {
        Style::default().fg(Color::DarkGray)
    } else if input.is_editing() {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let text = if input.is_editing() {
        format!("{}_", input.value())
    } else {
        input.value().to_string()
    };
    let header = Paragraph::new(Line::from(vec![Span::styled(text, style)])).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Query name (e to edit, ? for help)"),
    );
    frame.render_widget(header, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("q: quit"),
        Line::from("?: toggle help"),
        Line::from("Arrows or jk: select query"),
        Line::from("e: edit name (saved on Enter/Tab)"),
        Line::from("f: edit filter (kept local)"),
        Line::from("Esc: revert the field being edited"),
        Line::from("r: reload saved queries"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent, editing: bool) -> Option<Msg> {
    if editing {
        return match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(Msg::Quit),
            (_, KeyCode::Enter | KeyCode::Tab) => Some(Msg::Commit),
            (_, KeyCode::Esc) => Some(Msg::Revert),
            (_, KeyCode::Backspace) => Some(Msg::Backspace),
            (_, KeyCode::Char(ch)) => Some(Msg::Input(ch)),
            _ => None,
        };
    }

    match (key.modifiers, key.code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(Msg::Quit),
        (_, KeyCode::Char('?')) => Some(Msg::ToggleHelp),
        (_, KeyCode::Char('e')) => Some(Msg::EditName),
        (_, KeyCode::Char('f')) => Some(Msg::EditFilter),
        (_, KeyCode::Char('r')) => Some(Msg::Reload),
        (_, KeyCode::Up | KeyCode::Char('k')) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down | KeyCode::Char('j')) => Some(Msg::Navigate(DirectionKey::Down)),
        _ => None,
    }
}
