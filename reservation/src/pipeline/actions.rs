//! Actions accepted by the reservation reducer.

use super::types::OutstandingMessage;
use crate::counters::CountSnapshot;
use crate::error::SyncError;
use crate::sync::{BaselineOutcome, Connectivity};
use uuid::Uuid;

/// Commands from the page, and feedback from effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationAction {
    // ========== Commands ==========
    /// Page opened: restore local state, then fetch counts
    PageLoaded,

    /// Guest clicked a beverage
    ToggleItem {
        /// Item name
        item: String,
    },

    /// Guest submitted the form
    Submit {
        /// Name as typed
        guest_name: String,
    },

    /// Send queued reservations now
    FlushQueue,

    /// Check whether the service is reachable
    ProbeConnectivity,

    /// Try the last refused chat hand-off again
    RetryDispatch,

    // ========== Feedback ==========
    /// Baseline fetch finished
    BaselineFetched {
        /// Fresh counts or cached fallback
        outcome: BaselineOutcome,
    },

    /// The service acknowledged the current submission
    SyncSucceeded {
        /// Submission id
        local_id: Uuid,
        /// Counts after the reservation
        snapshot: CountSnapshot,
    },

    /// The current submission could not be synced
    SyncFailed {
        /// Submission id
        local_id: Uuid,
        /// Why
        error: SyncError,
    },

    /// Chat hand-off finished
    DispatchCompleted {
        /// What was sent
        message: OutstandingMessage,
        /// Whether the opener accepted the link
        handed_off: bool,
    },

    /// Confirmation screen time is up
    ConfirmationElapsed {
        /// Submission being confirmed
        local_id: Uuid,
    },

    /// Probe finished
    ConnectivityProbed {
        /// Probe result
        connectivity: Connectivity,
    },

    /// One queued reservation reached the service during a flush
    QueuedReservationSynced {
        /// Queue entry id
        local_id: Uuid,
        /// Counts after the reservation
        snapshot: CountSnapshot,
    },

    /// One queued reservation failed during a flush and stays queued
    QueuedReservationFailed {
        /// Queue entry id
        local_id: Uuid,
        /// Why
        error: SyncError,
    },

    /// Every entry of the flush has been attempted
    FlushFinished,
}
