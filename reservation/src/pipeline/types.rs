//! State and event types for the reservation pipeline.

use crate::catalog::Catalog;
use crate::counters::{CounterStore, PendingLedger};
use crate::error::{SelectionError, ValidationError};
use crate::queue::{PendingReservation, ReservationQueue};
use crate::selection::SelectionState;
use crate::storage::keys;
use crate::sync::Connectivity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// How a settled submission reached the counter service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The service acknowledged it
    Synced,
    /// It waits in the local queue
    Queued,
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

/// Where the pipeline is in handling the current submission.
///
/// `Validating`, `Persisting`, `Synced` and `Queued` are passed through
/// within a single reducer step; between steps the pipeline rests in one of
/// the other phases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for a submission
    #[default]
    Idle,
    /// Checking the form
    Validating,
    /// The last submission failed validation
    Rejected(ValidationError),
    /// Writing local state before any remote call
    Persisting,
    /// Waiting for the counter service
    Syncing,
    /// The service acknowledged the submission
    Synced,
    /// The submission went to the local queue
    Queued,
    /// Waiting for the chat hand-off
    Notifying,
    /// Submission finished; confirmation on screen
    Settled(SubmissionOutcome),
}

impl Phase {
    /// Whether a new submission may start.
    ///
    /// Guards against double submits: only one submission is in flight per
    /// page.
    #[must_use]
    pub const fn accepts_submission(&self) -> bool {
        matches!(self, Self::Idle | Self::Settled(_) | Self::Rejected(_))
    }

    /// Whether a submission is between validation and confirmation
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        !self.accepts_submission()
    }

    /// Short label for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected(_) => "rejected",
            Self::Persisting => "persisting",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Queued => "queued",
            Self::Notifying => "notifying",
            Self::Settled(_) => "settled",
        }
    }
}

/// The submission currently moving through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Local id, shared with the queue entry if it gets queued
    pub local_id: Uuid,
    /// Trimmed guest name
    pub guest_name: String,
    /// Selections at submit time
    pub selections: Vec<String>,
    /// Submit time
    pub submitted_at: DateTime<Utc>,
    /// Known once the sync step finished
    pub outcome: Option<SubmissionOutcome>,
}

impl Submission {
    /// The queue entry for this submission
    #[must_use]
    pub fn to_pending(&self) -> PendingReservation {
        PendingReservation {
            guest_name: self.guest_name.clone(),
            selections: self.selections.clone(),
            submitted_at: self.submitted_at,
            local_id: self.local_id,
        }
    }
}

/// A formatted chat message and the selections it accounts for.
///
/// Kept in durable storage until the hand-off is accepted, so a reload can
/// try again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingMessage {
    /// Submission the message belongs to
    pub local_id: Uuid,
    /// Selections to settle in the notification ledger once handed off
    pub selections: Vec<String>,
    /// Message text
    pub text: String,
}

/// Typed notifications for whatever renders the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Selection changed
    SelectionChanged {
        /// Items now selected
        selected: Vec<String>,
    },
    /// A toggle was refused
    SelectionRejected {
        /// Why
        reason: SelectionError,
    },
    /// Submit pressed while a submission was in flight
    SubmissionIgnored,
    /// Submission failed validation
    Rejected {
        /// First failing rule
        reason: ValidationError,
    },
    /// The counter service acknowledged the submission
    Synced {
        /// Submission id
        local_id: Uuid,
    },
    /// The submission was queued for later sync
    Queued {
        /// Submission id
        local_id: Uuid,
        /// Queue length after appending
        queue_len: usize,
    },
    /// The chat hand-off was refused; offer a retry
    DispatchBlocked {
        /// Submission id
        local_id: Uuid,
    },
    /// A previously blocked message was handed off
    DispatchRecovered {
        /// Submission id
        local_id: Uuid,
    },
    /// Submission finished
    Confirmed {
        /// Guest name
        guest_name: String,
        /// Synced or queued
        outcome: SubmissionOutcome,
        /// Text to show
        message: String,
    },
    /// Confirmation delay elapsed; show the invitation
    NavigateToInvitation,
    /// Display counts changed
    CountsUpdated {
        /// Item → display count
        counts: BTreeMap<String, u32>,
    },
    /// Connectivity changed
    ConnectivityChanged {
        /// New state
        connectivity: Connectivity,
    },
    /// A queued reservation reached the service
    QueuedReservationSynced {
        /// Entry id
        local_id: Uuid,
    },
    /// A queue flush finished
    QueueFlushed {
        /// Entries synced during this flush
        synced: usize,
        /// Entries still queued
        remaining: usize,
    },
}

/// Confirmation text shown after settling
#[must_use]
pub fn confirmation_message(guest_name: &str, outcome: SubmissionOutcome) -> String {
    match outcome {
        SubmissionOutcome::Synced => {
            format!("Merci {guest_name} ! Votre réservation est confirmée. Redirection vers votre invitation...")
        },
        SubmissionOutcome::Queued => format!(
            "Merci {guest_name} ! Votre réservation est enregistrée sur cet appareil et sera envoyée dès le retour de la connexion. Redirection vers votre invitation..."
        ),
    }
}

/// Everything the reservation page knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationState {
    /// Beverages on offer
    pub catalog: Catalog,
    /// Current choice
    pub selection: SelectionState,
    /// Baseline and sync-pending counts
    pub counters: CounterStore,
    /// Selections whose chat message has not been handed off
    pub notifications: PendingLedger,
    /// Reservations waiting for the service
    pub queue: ReservationQueue,
    /// Believed reachability of the service
    pub connectivity: Connectivity,
    /// Pipeline phase
    pub phase: Phase,
    /// Submission in flight or on the confirmation screen
    pub current: Option<Submission>,
    /// Messages whose hand-off was refused, oldest first
    pub undelivered: Vec<OutstandingMessage>,
    /// Message of the current submission while its hand-off runs
    pub dispatching: Option<OutstandingMessage>,
    /// Whether a queue flush is running
    pub flushing: bool,
    /// Entries synced by the running flush
    pub flush_synced: usize,
}

impl ReservationState {
    /// Fresh page state for `catalog`, allowing `max_selections` picks
    #[must_use]
    pub fn new(catalog: Catalog, max_selections: usize) -> Self {
        let counters = CounterStore::new(&catalog, keys::PENDING_COUNTS);
        Self {
            catalog,
            selection: SelectionState::with_max(max_selections),
            counters,
            notifications: PendingLedger::new(keys::PENDING_NOTIFICATIONS),
            queue: ReservationQueue::new(),
            connectivity: Connectivity::default(),
            phase: Phase::Idle,
            current: None,
            undelivered: Vec::new(),
            dispatching: None,
            flushing: false,
            flush_synced: 0,
        }
    }
}

impl Default for ReservationState {
    fn default() -> Self {
        Self::new(Catalog::default_beverages(), crate::selection::MAX_SELECTIONS)
    }
}
