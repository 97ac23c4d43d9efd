//! Client side of `POST /api/sync`.

use crate::collections::UserCollections;
use crate::config::SyncConfig;
use crate::error::{Result, ScarError};
use crate::sync::{SyncPayload, SyncResponse};
use reqwest::StatusCode;

/// Pushes full collections to the sync authority.
///
/// Requests carry no timeout: a hung request simply never resolves.
/// Failures are returned, never retried.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    endpoint: String,
    user_id: String,
}

impl SyncClient {
    /// Create a client for the configured endpoint and identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ScarError::Sync(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            user_id: config.user_id.clone(),
        })
    }

    /// The sync endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send every collection and return the authority's merged document.
    ///
    /// # Errors
    ///
    /// Returns [`ScarError::Unauthorized`] on `403`, and [`ScarError::Sync`]
    /// on transport failures, other non-success statuses, or a bad body.
    pub async fn push(&self, collections: &UserCollections) -> Result<UserCollections> {
        let payload = SyncPayload::full(collections, self.user_id.clone());
        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScarError::Sync(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(ScarError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ScarError::Sync(format!("unexpected status {status}")));
        }

        let body: SyncResponse = response
            .json()
            .await
            .map_err(|e| ScarError::Sync(format!("bad response body: {e}")))?;
        Ok(body.data)
    }
}
