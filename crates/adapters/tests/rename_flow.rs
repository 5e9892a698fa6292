use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use savedq_adapters::http::HttpSavedQueryApi;
use savedq_adapters::local::LocalSavedQueryApi;
use savedq_core::location::{Location, MemoryLocation};
use savedq_core::name_edit::{CommitOutcome, FocusHandle, NameEditController, NameEditError};
use savedq_core::notifications::{NoticeLevel, NotificationLog};
use savedq_core::query_view::QueryView;
use savedq_core::saved_query::{FileSavedQueriesStore, Organization, SavedQueryRecord};
use savedq_core::saved_query_api::{
    AnnouncingUpdater, ApiError, SavedQueryLister, NAME_NOT_SAVED_MESSAGE, NAME_SAVED_MESSAGE,
};
use tempfile::TempDir;

const RESULTS_PATH: &str = "/organizations/acme/discover/results/";

#[derive(Debug, Default)]
struct CountingFocus(AtomicUsize);

impl FocusHandle for CountingFocus {
    fn request_focus(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn seed_store(temp_dir: &TempDir) -> SavedQueryRecord {
    let store = FileSavedQueriesStore::new(temp_dir.path().join("saved_queries.toml"));
    let mut record = SavedQueryRecord::new("5", "Old");
    record.fields = vec!["title".to_string(), "count()".to_string()];
    record.orderby = Some("-count".to_string());
    record.query = "event.type:error".to_string();
    record.projects = vec![1];
    record.range = Some("14d".to_string());
    store.save(vec![record.clone()]).expect("store should save");
    record
}

#[tokio::test(flavor = "current_thread")]
async fn rename_against_local_store_updates_disk_location_and_notices() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let record = seed_store(&temp_dir);
    let api = Arc::new(
        LocalSavedQueryApi::load_from_path(temp_dir.path().join("saved_queries.toml"))
            .expect("api should load"),
    );
    let notices = NotificationLog::new();
    let location = MemoryLocation::new(Location::new(RESULTS_PATH));
    let controller = NameEditController::new(
        AnnouncingUpdater::new(Arc::clone(&api), notices.clone()),
        notices.clone(),
        location.clone(),
        Organization::new("acme"),
    );
    let refreshes = AtomicUsize::new(0);
    let listener = |_: &SavedQueryRecord| {
        refreshes.fetch_add(1, Ordering::Relaxed);
    };

    // The user has an unsaved filter edit in progress while renaming.
    let edited_view = QueryView::from_record(&record).with_query("browser:Firefox");
    let outcome = controller
        .on_name_committed(
            "  New  ",
            &edited_view,
            std::slice::from_ref(&record),
            &CountingFocus::default(),
            &listener,
        )
        .await
        .expect("rename should succeed");
    assert!(matches!(outcome, CommitOutcome::Renamed { .. }));
    assert_eq!(refreshes.load(Ordering::Relaxed), 1);

    let listed = api
        .list_saved_queries(&Organization::new("acme"))
        .await
        .expect("listing should succeed");
    assert_eq!(listed.len(), 1);
    let stored = &listed[0];
    assert_eq!(stored.name, "New");
    assert_eq!(stored.query, "event.type:error");
    assert_eq!(stored.fields, record.fields);
    assert_eq!(stored.orderby, record.orderby);

    let current = location.current();
    assert_eq!(current.pathname, RESULTS_PATH);
    assert_eq!(
        current.query,
        QueryView::from_record(stored).to_query_string_params()
    );
    assert!(current.to_url().contains("name=New"));

    let all = notices.notices();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].level, NoticeLevel::Success);
    assert_eq!(all[0].message, NAME_SAVED_MESSAGE);
}

#[tokio::test(flavor = "current_thread")]
async fn stale_list_entry_surfaces_a_failed_save() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    seed_store(&temp_dir);
    let api = LocalSavedQueryApi::load_from_path(temp_dir.path().join("saved_queries.toml"))
        .expect("api should load");
    let notices = NotificationLog::new();
    let location = MemoryLocation::new(Location::new(RESULTS_PATH));
    let controller = NameEditController::new(
        AnnouncingUpdater::new(api, notices.clone()),
        notices.clone(),
        location.clone(),
        Organization::new("acme"),
    );

    // The owner's cached list still holds a query deleted on the server.
    let deleted = SavedQueryRecord::new("8", "Gone");
    let err = controller
        .on_name_committed(
            "Renamed",
            &QueryView::from_record(&deleted),
            std::slice::from_ref(&deleted),
            &CountingFocus::default(),
            &|_: &SavedQueryRecord| {},
        )
        .await
        .expect_err("update should fail");

    assert!(matches!(
        err,
        NameEditError::Update(ApiError::NotFound { .. })
    ));
    assert_eq!(location.replacements(), 0);
    let latest = notices.latest().expect("failure should be announced");
    assert_eq!(latest.level, NoticeLevel::Error);
    assert_eq!(latest.message, NAME_NOT_SAVED_MESSAGE);
}

#[tokio::test(flavor = "current_thread")]
async fn rename_keeps_records_written_since_the_last_listing() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let record = seed_store(&temp_dir);
    let path = temp_dir.path().join("saved_queries.toml");
    let api = LocalSavedQueryApi::load_from_path(&path).expect("api should load");
    let organization = Organization::new("acme");
    let listed = api
        .list_saved_queries(&organization)
        .await
        .expect("listing should succeed");

    // Another process saves a new query after the list was fetched.
    let other = FileSavedQueriesStore::new(&path);
    let mut on_disk = other.load().expect("store should load");
    on_disk.push(SavedQueryRecord::new("7", "Added elsewhere"));
    other.save(on_disk).expect("store should save");

    let controller = NameEditController::new(
        api,
        NotificationLog::new(),
        MemoryLocation::new(Location::new(RESULTS_PATH)),
        organization,
    );
    controller
        .on_name_committed(
            "New",
            &QueryView::from_record(&record),
            &listed,
            &CountingFocus::default(),
            &|_: &SavedQueryRecord| {},
        )
        .await
        .expect("rename should succeed");

    let after = other.load().expect("store should reload");
    let names: Vec<(&str, &str)> = after
        .iter()
        .map(|record| (record.id.as_str(), record.name.as_str()))
        .collect();
    assert_eq!(names, vec![("5", "New"), ("7", "Added elsewhere")]);
}

fn http_integration_enabled() -> bool {
    matches!(
        std::env::var("SAVEDQ_RUN_HTTP_INTEGRATION").ok().as_deref(),
        Some("1")
    )
}

#[tokio::test(flavor = "current_thread")]
async fn http_api_lists_saved_queries() {
    if !http_integration_enabled() {
        return;
    }

    let base_url = std::env::var("SAVEDQ_TEST_API_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let organization = Organization::new(
        std::env::var("SAVEDQ_TEST_ORG").unwrap_or_else(|_| "sentry".to_string()),
    );
    let api = HttpSavedQueryApi::new(
        base_url,
        std::env::var("SAVEDQ_AUTH_TOKEN").ok(),
        Duration::from_secs(10),
    )
    .expect("client should build");

    let listed = api
        .list_saved_queries(&organization)
        .await
        .expect("listing should succeed");
    assert!(listed.iter().all(|record| !record.id.is_empty()));
}
