use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use savedq_core::query_view::QueryView;
use savedq_core::saved_query::{Organization, SavedQueryRecord};
use savedq_core::saved_query_api::{ApiError, SavedQueryLister, SavedQueryUpdater};
use serde::Deserialize;

/// Talks to the discover saved-query endpoints of a Sentry-style API.
#[derive(Debug, Clone)]
pub struct HttpSavedQueryApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

impl HttpSavedQueryApi {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    #[must_use]
    pub fn saved_queries_url(&self, organization: &Organization) -> String {
        format!(
            "{}/api/0/organizations/{}/discover/saved/",
            self.base_url, organization.slug
        )
    }

    #[must_use]
    pub fn saved_query_url(&self, organization: &Organization, id: &str) -> String {
        format!("{}{id}/", self.saved_queries_url(organization))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))
    }
}

async fn reject(response: Response, id: Option<&str>) -> ApiError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return ApiError::NotFound { id: id.to_string() };
        }
    }

    let body = response.text().await.unwrap_or_default();
    ApiError::Rejected {
        status: status.as_u16(),
        detail: error_detail(&body),
    }
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail)
}

#[async_trait]
impl SavedQueryUpdater for HttpSavedQueryApi {
    async fn update_query_name(
        &self,
        organization: &Organization,
        view: &QueryView,
    ) -> Result<SavedQueryRecord, ApiError> {
        let id = view.id.as_deref().ok_or(ApiError::MissingId)?;
        let url = self.saved_query_url(organization, id);
        tracing::debug!(%url, "updating saved query");

        let response = self
            .send(self.client.put(&url).json(&view.to_record_payload()))
            .await?;
        if !response.status().is_success() {
            return Err(reject(response, Some(id)).await);
        }

        response
            .json::<SavedQueryRecord>()
            .await
            .map_err(|error| ApiError::Decode(error.to_string()))
    }
}

#[async_trait]
impl SavedQueryLister for HttpSavedQueryApi {
    async fn list_saved_queries(
        &self,
        organization: &Organization,
    ) -> Result<Vec<SavedQueryRecord>, ApiError> {
        let url = self.saved_queries_url(organization);
        let response = self.send(self.client.get(&url)).await?;
        if !response.status().is_success() {
            return Err(reject(response, None).await);
        }

        response
            .json::<Vec<SavedQueryRecord>>()
            .await
            .map_err(|error| ApiError::Decode(error.to_string()))
    }
}
