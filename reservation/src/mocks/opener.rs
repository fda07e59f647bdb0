//! Mock deep-link opener.

use crate::notification::DeepLinkOpener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Records every link it is asked to open
#[derive(Debug, Default)]
pub struct MockOpener {
    blocked: AtomicBool,
    latency: Mutex<Duration>,
    opened: Mutex<Vec<String>>,
}

impl MockOpener {
    /// Opener that accepts every link
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener that refuses every link, like a popup blocker
    #[must_use]
    pub fn blocked() -> Self {
        let opener = Self::default();
        opener.set_blocked(true);
        opener
    }

    /// Toggle refusal
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Delay before answering
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Links seen so far, accepted or not
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeepLinkOpener for MockOpener {
    async fn open(&self, url: &str) -> bool {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        !self.blocked.load(Ordering::SeqCst)
    }
}
