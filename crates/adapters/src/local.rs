use std::path::PathBuf;

use async_trait::async_trait;
use savedq_core::query_view::QueryView;
use savedq_core::saved_query::{
    FileSavedQueriesStore, Organization, SavedQueriesError, SavedQueryRecord,
};
use savedq_core::saved_query_api::{ApiError, SavedQueryLister, SavedQueryUpdater};
use tokio::sync::Mutex;

/// Serves saved queries from a TOML file, standing in for the server when
/// no API endpoint is configured. The organization is not used to scope
/// records.
#[derive(Debug)]
pub struct LocalSavedQueryApi {
    store: FileSavedQueriesStore,
    file_access: Mutex<()>,
}

impl LocalSavedQueryApi {
    #[must_use]
    pub fn new(store: FileSavedQueriesStore) -> Self {
        Self {
            store,
            file_access: Mutex::new(()),
        }
    }

    /// Opens the file once up front so a malformed store fails at startup.
    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SavedQueriesError> {
        let store = FileSavedQueriesStore::new(path);
        store.load()?;
        Ok(Self::new(store))
    }
}

fn to_storage_error(error: SavedQueriesError) -> ApiError {
    ApiError::Storage(error.to_string())
}

#[async_trait]
impl SavedQueryUpdater for LocalSavedQueryApi {
    async fn update_query_name(
        &self,
        _organization: &Organization,
        view: &QueryView,
    ) -> Result<SavedQueryRecord, ApiError> {
        let id = view.id.as_deref().ok_or(ApiError::MissingId)?;
        let stamped_at = chrono::Utc::now().to_rfc3339();

        let _guard = self.file_access.lock().await;
        let saved = self
            .store
            .update_record(id, |existing| {
                let mut record = view.to_record_payload();
                record.date_created.clone_from(&existing.date_created);
                record.date_updated = Some(stamped_at);
                record
            })
            .map_err(to_storage_error)?
            .ok_or_else(|| ApiError::NotFound { id: id.to_string() })?;

        tracing::debug!(id, path = %self.store.path().display(), "saved query stored");
        Ok(saved)
    }
}

#[async_trait]
impl SavedQueryLister for LocalSavedQueryApi {
    async fn list_saved_queries(
        &self,
        _organization: &Organization,
    ) -> Result<Vec<SavedQueryRecord>, ApiError> {
        let _guard = self.file_access.lock().await;
        self.store.load().map_err(to_storage_error)
    }
}
