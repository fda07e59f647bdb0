//! Mock counter service.

use crate::counters::{CountSnapshot, ItemCount};
use crate::error::SyncError;
use crate::remote::{RemoteCounterService, ReservationRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Counter service kept in memory.
///
/// Reservations succeed and bump the counts unless the service is marked
/// unreachable or a scripted outcome says otherwise. Scripted outcomes are
/// consumed one per `reserve` call, oldest first.
#[derive(Debug)]
pub struct MockCounterService {
    counts: Mutex<CountSnapshot>,
    script: Mutex<VecDeque<Result<(), SyncError>>>,
    requests: Mutex<Vec<ReservationRequest>>,
    latency: Mutex<Duration>,
    reachable: AtomicBool,
    fetches: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockCounterService {
    /// Reachable service with no counts
    #[must_use]
    pub fn new() -> Self {
        Self::with_counts(CountSnapshot::new())
    }

    /// Reachable service starting from `counts`
    #[must_use]
    pub fn with_counts(counts: CountSnapshot) -> Self {
        Self {
            counts: Mutex::new(counts),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
            reachable: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Unreachable services fail every call with [`SyncError::Unreachable`]
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay applied before answering any call
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Queues outcomes for upcoming `reserve` calls
    pub fn script_reserve(&self, outcomes: impl IntoIterator<Item = Result<(), SyncError>>) {
        lock(&self.script).extend(outcomes);
    }

    /// Reservations accepted so far, in arrival order
    #[must_use]
    pub fn requests(&self) -> Vec<ReservationRequest> {
        lock(&self.requests).clone()
    }

    /// Current counts
    #[must_use]
    pub fn counts(&self) -> CountSnapshot {
        lock(&self.counts).clone()
    }

    /// Number of `fetch_counts` calls
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn ensure_reachable(&self) -> Result<(), SyncError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Unreachable("mock service offline".to_string()))
        }
    }
}

impl Default for MockCounterService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCounterService for MockCounterService {
    async fn fetch_counts(&self) -> Result<CountSnapshot, SyncError> {
        self.wait().await;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        Ok(self.counts())
    }

    async fn reserve(&self, request: ReservationRequest) -> Result<CountSnapshot, SyncError> {
        self.wait().await;
        self.ensure_reachable()?;

        if let Some(Err(error)) = lock(&self.script).pop_front() {
            return Err(error);
        }

        let mut counts = lock(&self.counts);
        for name in &request.selected_boissons {
            let count = counts.count(name) + 1;
            counts.insert(
                name.clone(),
                ItemCount {
                    count,
                    last_updated: Some(request.timestamp),
                },
            );
        }
        lock(&self.requests).push(request);
        Ok(counts.clone())
    }

    async fn probe(&self) -> bool {
        self.wait().await;
        self.reachable.load(Ordering::SeqCst)
    }
}
