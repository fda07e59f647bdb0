//! The remote counter/reservation service.
//!
//! [`RemoteCounterService`] is the port the pipeline talks to;
//! [`HttpCounterService`] is the JSON-over-HTTP adapter used in production.

use crate::counters::CountSnapshot;
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Body of a reserve call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Guest name
    pub name: String,
    /// Selected item names
    #[serde(rename = "selectedBoissons")]
    pub selected_boissons: Vec<String>,
    /// Submission time
    pub timestamp: DateTime<Utc>,
}

/// Envelope returned by every service call
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// Counts after the call
    #[serde(default)]
    pub counts: Option<CountSnapshot>,
    /// Reason when `success` is false
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceResponse {
    /// Extracts the snapshot from a successful envelope.
    ///
    /// # Errors
    ///
    /// [`SyncError::Service`] when `success` is false,
    /// [`SyncError::MalformedResponse`] when counts are missing.
    pub fn into_snapshot(self) -> Result<CountSnapshot, SyncError> {
        if !self.success {
            return Err(SyncError::Service(
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }
        self.counts
            .ok_or_else(|| SyncError::MalformedResponse("response has no counts".to_string()))
    }
}

/// Port to the counter service.
///
/// Implementations do not apply their own deadline; [`crate::sync::RemoteSync`]
/// wraps every call in a wait window.
pub trait RemoteCounterService: Send + Sync + 'static {
    /// Current counts for all items
    fn fetch_counts(&self) -> impl Future<Output = Result<CountSnapshot, SyncError>> + Send;

    /// Records a reservation and returns the updated counts
    fn reserve(
        &self,
        request: ReservationRequest,
    ) -> impl Future<Output = Result<CountSnapshot, SyncError>> + Send;

    /// Cheap reachability check
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// HTTP adapter: `GET {base}/counts`, `POST {base}/reserve`, `HEAD {base}/counts`
#[derive(Clone, Debug)]
pub struct HttpCounterService {
    client: Client,
    base_url: String,
}

impl HttpCounterService {
    /// Adapter for the service rooted at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Adapter using a preconfigured client
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Service root
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode(response: reqwest::Response) -> Result<CountSnapshot, SyncError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .json::<ServiceResponse>()
            .await
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))?
            .into_snapshot()
    }
}

impl RemoteCounterService for HttpCounterService {
    async fn fetch_counts(&self) -> Result<CountSnapshot, SyncError> {
        let response = self
            .client
            .get(format!("{}/counts", self.base_url))
            .send()
            .await
            .map_err(|e| SyncError::Unreachable(e.to_string()))?;

        Self::decode(response).await
    }

    async fn reserve(&self, request: ReservationRequest) -> Result<CountSnapshot, SyncError> {
        let response = self
            .client
            .post(format!("{}/reserve", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Unreachable(e.to_string()))?;

        Self::decode(response).await
    }

    async fn probe(&self) -> bool {
        match self
            .client
            .head(format!("{}/counts", self.base_url))
            .send()
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!(%error, "counter service probe failed");
                false
            },
        }
    }
}
