use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::notifications::NotificationSink;
use crate::query_view::QueryView;
use crate::saved_query::{Organization, SavedQueryRecord};

pub const NAME_SAVED_MESSAGE: &str = "Query name saved";
pub const NAME_NOT_SAVED_MESSAGE: &str = "Query name not saved";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("saved query `{id}` does not exist")]
    NotFound { id: String },
    #[error("query view has no id to update")]
    MissingId,
    #[error("server rejected the request with status {status}")]
    Rejected { status: u16, detail: Option<String> },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode server response: {0}")]
    Decode(String),
    #[error("saved query storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// The server-provided detail when there is one.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.as_str(),
            _ => NAME_NOT_SAVED_MESSAGE,
        }
    }
}

#[async_trait]
pub trait SavedQueryUpdater: Send + Sync {
    /// Persists the view and resolves with the server's copy of the record.
    async fn update_query_name(
        &self,
        organization: &Organization,
        view: &QueryView,
    ) -> Result<SavedQueryRecord, ApiError>;
}

#[async_trait]
pub trait SavedQueryLister: Send + Sync {
    async fn list_saved_queries(
        &self,
        organization: &Organization,
    ) -> Result<Vec<SavedQueryRecord>, ApiError>;
}

#[async_trait]
impl<T: SavedQueryUpdater + ?Sized> SavedQueryUpdater for Arc<T> {
    async fn update_query_name(
        &self,
        organization: &Organization,
        view: &QueryView,
    ) -> Result<SavedQueryRecord, ApiError> {
        (**self).update_query_name(organization, view).await
    }
}

#[async_trait]
impl<T: SavedQueryLister + ?Sized> SavedQueryLister for Arc<T> {
    async fn list_saved_queries(
        &self,
        organization: &Organization,
    ) -> Result<Vec<SavedQueryRecord>, ApiError> {
        (**self).list_saved_queries(organization).await
    }
}

/// Wraps an updater with success and failure toasts. The result is passed
/// through untouched.
#[derive(Debug, Clone)]
pub struct AnnouncingUpdater<U, N> {
    inner: U,
    notifier: N,
}

impl<U, N> AnnouncingUpdater<U, N> {
    #[must_use]
    pub fn new(inner: U, notifier: N) -> Self {
        Self { inner, notifier }
    }
}

#[async_trait]
impl<U, N> SavedQueryUpdater for AnnouncingUpdater<U, N>
where
    U: SavedQueryUpdater,
    N: NotificationSink,
{
    async fn update_query_name(
        &self,
        organization: &Organization,
        view: &QueryView,
    ) -> Result<SavedQueryRecord, ApiError> {
        let result = self.inner.update_query_name(organization, view).await;
        match &result {
            Ok(_) => self.notifier.show_success(NAME_SAVED_MESSAGE),
            Err(error) => self.notifier.show_error(error.user_message()),
        }
        result
    }
}
