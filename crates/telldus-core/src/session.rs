//! The authenticated request capability the sync runs on.
//!
//! [`TelldusSession`] abstracts over the real OAuth-signed HTTP client
//! ([`OAuthSession`](crate::OAuthSession)) and the scripted
//! [`MockSession`](crate::MockSession) used in tests. Everything above this
//! layer (sensor roster, history fetcher, orchestrator) only sees status codes
//! and bodies.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::RemoteFetchError;

/// A raw API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// Endpoint that produced the response, for diagnostics.
    pub endpoint: String,
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Decode the body, failing on any status other than 200.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, RemoteFetchError> {
        if !self.is_success() {
            return Err(RemoteFetchError::Status {
                endpoint: self.endpoint,
                status: self.status,
                body: self.body,
            });
        }
        serde_json::from_str(&self.body).map_err(|source| RemoteFetchError::Decode {
            endpoint: self.endpoint,
            source,
        })
    }
}

/// Issues authenticated GET requests against the remote telemetry API.
///
/// `endpoint` is relative to the API root (e.g. `"sensors/list"`). A response
/// with any status is `Ok`; `Err` means no response was received.
#[async_trait]
pub trait TelldusSession: Send + Sync {
    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse, RemoteFetchError>;
}
