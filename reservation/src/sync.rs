//! Deadline-bounded access to the counter service, plus connectivity state.

use crate::counters::CountSnapshot;
use crate::error::SyncError;
use crate::remote::{RemoteCounterService, ReservationRequest};
use crate::storage::{KeyValueStore, keys, load_json, save_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Whether the counter service is believed reachable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Submissions go to the service first
    #[default]
    Online,
    /// Submissions go straight to the queue
    Offline,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Result of a baseline fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// The service answered; the page is online
    Fresh(CountSnapshot),
    /// The service did not answer; the page is offline and shows the cached
    /// snapshot (empty if none was ever cached)
    Fallback {
        /// Last cached snapshot
        cached: CountSnapshot,
        /// Why the fetch failed
        error: SyncError,
    },
}

impl BaselineOutcome {
    /// Snapshot to display
    #[must_use]
    pub const fn snapshot(&self) -> &CountSnapshot {
        match self {
            Self::Fresh(snapshot) | Self::Fallback { cached: snapshot, .. } => snapshot,
        }
    }

    /// Connectivity implied by the outcome
    #[must_use]
    pub const fn connectivity(&self) -> Connectivity {
        match self {
            Self::Fresh(_) => Connectivity::Online,
            Self::Fallback { .. } => Connectivity::Offline,
        }
    }
}

/// Wraps a [`RemoteCounterService`] with a fixed wait window and keeps the
/// last fresh snapshot cached in durable storage.
pub struct RemoteSync<R> {
    service: Arc<R>,
    cache: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl<R> Clone for RemoteSync<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache: Arc::clone(&self.cache),
            timeout: self.timeout,
        }
    }
}

impl<R> fmt::Debug for RemoteSync<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSync")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteCounterService> RemoteSync<R> {
    /// Wraps `service`; every call gets `timeout` to complete
    #[must_use]
    pub fn new(service: Arc<R>, cache: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self {
            service,
            cache,
            timeout,
        }
    }

    /// Wait window applied to each call
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Last snapshot cached from a fresh answer
    #[must_use]
    pub fn cached_snapshot(&self) -> Option<CountSnapshot> {
        load_json(self.cache.as_ref(), keys::COUNTS_SNAPSHOT)
    }

    /// Fetches current counts, falling back to the cached snapshot.
    pub async fn fetch_baseline(&self) -> BaselineOutcome {
        match self.bounded(self.service.fetch_counts()).await {
            Ok(snapshot) => {
                self.remember(&snapshot);
                BaselineOutcome::Fresh(snapshot)
            },
            Err(error) => {
                tracing::warn!(%error, "baseline fetch failed, using cached counts");
                BaselineOutcome::Fallback {
                    cached: self.cached_snapshot().unwrap_or_default(),
                    error,
                }
            },
        }
    }

    /// Sends one reservation.
    ///
    /// # Errors
    ///
    /// Any [`SyncError`], including [`SyncError::Timeout`] when the window
    /// elapses. The caller queues the reservation.
    pub async fn submit(
        &self,
        guest_name: &str,
        selections: &[String],
        submitted_at: DateTime<Utc>,
    ) -> Result<CountSnapshot, SyncError> {
        let request = ReservationRequest {
            name: guest_name.to_string(),
            selected_boissons: selections.to_vec(),
            timestamp: submitted_at,
        };

        let snapshot = self.bounded(self.service.reserve(request)).await?;
        self.remember(&snapshot);
        Ok(snapshot)
    }

    /// Probes the service; an elapsed window counts as offline
    pub async fn probe_connectivity(&self) -> Connectivity {
        match tokio::time::timeout(self.timeout, self.service.probe()).await {
            Ok(true) => Connectivity::Online,
            Ok(false) | Err(_) => Connectivity::Offline,
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<CountSnapshot, SyncError>
    where
        F: Future<Output = Result<CountSnapshot, SyncError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Timeout {
                    after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            })
    }

    fn remember(&self, snapshot: &CountSnapshot) {
        if let Err(error) = save_json(self.cache.as_ref(), keys::COUNTS_SNAPSHOT, snapshot) {
            tracing::warn!(%error, "failed to cache counts snapshot");
        }
    }
}
