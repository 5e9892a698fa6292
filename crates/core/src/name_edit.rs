//! Save-on-blur renaming of a saved query.
//!
//! The inline name field reports its text when it loses focus. The
//! controller validates the text, skips commits that change nothing, and
//! otherwise persists a copy of the stored record with only the name
//! replaced. Unsaved edits to the rest of the query are never sent.

use thiserror::Error;

use crate::location::{Location, LocationSink};
use crate::notifications::NotificationSink;
use crate::query_view::QueryView;
use crate::saved_query::{find_by_id, Organization, SavedQueryRecord};
use crate::saved_query_api::{ApiError, SavedQueryUpdater};

pub const EMPTY_NAME_MESSAGE: &str = "Please set a name for this query";

/// Lets the controller pull focus back into the name field.
pub trait FocusHandle: Send + Sync {
    fn request_focus(&self);
}

/// Told about every confirmed save so the owner can refresh its list.
pub trait SaveListener: Send + Sync {
    fn on_query_saved(&self, record: &SavedQueryRecord);
}

impl<F> SaveListener for F
where
    F: Fn(&SavedQueryRecord) + Send + Sync,
{
    fn on_query_saved(&self, record: &SavedQueryRecord) {
        self(record);
    }
}

/// What the inline field needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFieldProps {
    pub value: String,
    pub disabled: bool,
}

impl NameFieldProps {
    #[must_use]
    pub fn for_view(view: &QueryView) -> Self {
        Self {
            value: view.display_name().to_string(),
            disabled: !view.is_saved(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    Unsaved,
    UnknownQuery,
    SameName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitPlan {
    Reject,
    Skip(NoOpReason),
    Rename(QueryView),
}

/// Decides what a commit should do without touching any collaborator.
#[must_use]
pub fn plan_commit(
    raw_value: &str,
    view: &QueryView,
    saved_queries: &[SavedQueryRecord],
) -> CommitPlan {
    let candidate = raw_value.trim();
    if candidate.is_empty() {
        return CommitPlan::Reject;
    }

    let Some(id) = view.id.as_deref() else {
        return CommitPlan::Skip(NoOpReason::Unsaved);
    };
    let Some(saved) = find_by_id(saved_queries, id) else {
        return CommitPlan::Skip(NoOpReason::UnknownQuery);
    };
    if saved.name == candidate {
        return CommitPlan::Skip(NoOpReason::SameName);
    }

    // Built from the stored record so pending filter or column edits stay local.
    let renamed = SavedQueryRecord {
        name: candidate.to_string(),
        ..saved.clone()
    };
    CommitPlan::Rename(QueryView::from_record(&renamed))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Rejected,
    Unchanged(NoOpReason),
    Renamed {
        record: SavedQueryRecord,
        view: QueryView,
        location: Location,
    },
}

#[derive(Debug, Error)]
pub enum NameEditError {
    #[error("failed to save query name: {0}")]
    Update(#[source] ApiError),
}

#[derive(Debug)]
pub struct NameEditController<U, N, L> {
    updater: U,
    notifier: N,
    location: L,
    organization: Organization,
}

impl<U, N, L> NameEditController<U, N, L>
where
    U: SavedQueryUpdater,
    N: NotificationSink,
    L: LocationSink,
{
    #[must_use]
    pub fn new(updater: U, notifier: N, location: L, organization: Organization) -> Self {
        Self {
            updater,
            notifier,
            location,
            organization,
        }
    }

    #[must_use]
    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    /// Handles one blur of the name field.
    ///
    /// An empty name is reported through the notifier and focus is pulled
    /// back; nothing is returned as an error for it. Only a failed remote
    /// update comes back as `Err`, and in that case neither the listener nor
    /// the location is touched.
    pub async fn on_name_committed(
        &self,
        raw_value: &str,
        view: &QueryView,
        saved_queries: &[SavedQueryRecord],
        focus: &dyn FocusHandle,
        listener: &dyn SaveListener,
    ) -> Result<CommitOutcome, NameEditError> {
        let next_view = match plan_commit(raw_value, view, saved_queries) {
            CommitPlan::Reject => {
                tracing::debug!("rejected empty query name");
                self.notifier.show_error(EMPTY_NAME_MESSAGE);
                focus.request_focus();
                return Ok(CommitOutcome::Rejected);
            }
            CommitPlan::Skip(reason) => {
                tracing::debug!(?reason, id = ?view.id, "query name commit is a no-op");
                return Ok(CommitOutcome::Unchanged(reason));
            }
            CommitPlan::Rename(next_view) => next_view,
        };

        tracing::info!(
            organization = %self.organization.slug,
            id = ?next_view.id,
            name = %next_view.name,
            "saving query name"
        );
        let record = self
            .updater
            .update_query_name(&self.organization, &next_view)
            .await
            .map_err(|error| {
                tracing::warn!(%error, id = ?next_view.id, "query name update failed");
                NameEditError::Update(error)
            })?;

        listener.on_query_saved(&record);

        let saved_view = QueryView::from_record(&record);
        let pathname = self.location.pathname();
        let query = saved_view.to_query_string_params();
        self.location.replace(&pathname, query.clone());

        Ok(CommitOutcome::Renamed {
            record,
            view: saved_view,
            location: Location { pathname, query },
        })
    }
}
