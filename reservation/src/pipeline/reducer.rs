//! Reducer for the reservation pipeline.
//!
//! Every storage write happens here, synchronously, before any effect that
//! talks to the counter service or the chat opener is returned. A page that
//! dies mid-sync therefore finds the ledgers and the guest's record on disk
//! when it reloads.

use super::actions::ReservationAction;
use super::environment::ReservationEnvironment;
use super::types::{
    OutstandingMessage, Phase, PipelineEvent, ReservationState, Submission, SubmissionOutcome,
    confirmation_message,
};
use crate::error::ValidationError;
use crate::invitation::SessionRecord;
use crate::notification::{DeepLinkOpener, format_message};
use crate::queue::ReservationQueue;
use crate::remote::RemoteCounterService;
use crate::storage::{keys, load_json, save_json};
use crate::sync::Connectivity;
use rsvp_core::{SmallVec, async_effect, delay, effect::Effect, reducer::Reducer, smallvec};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// Minimum guest name length, in characters, after trimming
pub const MIN_NAME_CHARS: usize = 2;

type Effects = SmallVec<[Effect<ReservationAction>; 4]>;

/// Checks a submission, reporting the first failing rule.
///
/// # Errors
///
/// Name too short, then empty selection, then too many selections.
pub fn validate_submission(
    guest_name: &str,
    selections: &[String],
    max_selections: usize,
) -> Result<(), ValidationError> {
    if guest_name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::NameTooShort {
            min: MIN_NAME_CHARS,
        });
    }
    if selections.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    if selections.len() > max_selections {
        return Err(ValidationError::TooManySelections {
            max: max_selections,
        });
    }
    Ok(())
}

/// Drives a submission from the form to the confirmation screen.
///
/// ```text
/// Idle → Validating → Rejected
///                   → Persisting → Syncing → Synced → Notifying → Settled → Idle
///                                          → Queued ↗
/// ```
pub struct ReservationReducer<R, O> {
    _ports: PhantomData<fn() -> (R, O)>,
}

impl<R, O> ReservationReducer<R, O> {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _ports: PhantomData,
        }
    }
}

impl<R, O> Default for ReservationReducer<R, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O> Clone for ReservationReducer<R, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, O> Copy for ReservationReducer<R, O> {}

impl<R, O> fmt::Debug for ReservationReducer<R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReservationReducer")
    }
}

impl<R: RemoteCounterService, O: DeepLinkOpener> ReservationReducer<R, O> {
    fn transition(state: &mut ReservationState, to: Phase) {
        tracing::debug!(from = state.phase.label(), to = to.label(), "pipeline transition");
        state.phase = to;
    }

    /// Returns whether the value changed
    fn set_connectivity(
        state: &mut ReservationState,
        to: Connectivity,
        env: &ReservationEnvironment<R, O>,
    ) -> bool {
        if state.connectivity == to {
            return false;
        }
        tracing::info!(from = %state.connectivity, %to, "connectivity changed");
        state.connectivity = to;
        env.events.emit(PipelineEvent::ConnectivityChanged { connectivity: to });
        true
    }

    fn emit_counts(state: &ReservationState, env: &ReservationEnvironment<R, O>) {
        env.events.emit(PipelineEvent::CountsUpdated {
            counts: state.counters.display_counts(),
        });
    }

    /// Whether `local_id` is the submission the pipeline is waiting on in `phase`
    fn is_current(state: &ReservationState, local_id: Uuid, phase: &Phase) -> bool {
        &state.phase == phase
            && state
                .current
                .as_ref()
                .is_some_and(|current| current.local_id == local_id)
    }

    // ========== Page lifecycle ==========

    fn load_page(state: &mut ReservationState, env: &ReservationEnvironment<R, O>) -> Effects {
        let local = env.local.as_ref();
        state.counters.load_pending(local);
        state.notifications.load(local);
        state.queue = ReservationQueue::load(local);
        state.undelivered = load_json(local, keys::UNDELIVERED_MESSAGES).unwrap_or_default();
        state.dispatching = None;
        if let Some(cached) = env.sync.cached_snapshot() {
            state.counters.load_baseline(&cached);
        }

        tracing::info!(
            queued = state.queue.len(),
            pending = state.counters.pending().total(),
            undispatched = state.notifications.total(),
            undelivered = state.undelivered.len(),
            "reservation page loaded"
        );
        Self::emit_counts(state, env);

        let sync = env.sync.clone();
        let mut effects: Effects = smallvec![async_effect! {
            Some(ReservationAction::BaselineFetched {
                outcome: sync.fetch_baseline().await,
            })
        }];
        // hand-offs left over from an earlier visit
        effects.extend(Self::retry_dispatch(state, env));
        effects
    }

    fn toggle(state: &mut ReservationState, item: String, env: &ReservationEnvironment<R, O>) {
        if !state.catalog.contains(&item) {
            tracing::warn!(%item, "toggle for unknown item");
            env.events.emit(PipelineEvent::SelectionRejected {
                reason: crate::error::SelectionError::UnknownItem(item),
            });
            return;
        }

        match state.selection.toggle(&item) {
            Ok(toggle) => {
                tracing::debug!(%item, ?toggle, "selection toggled");
                env.events.emit(PipelineEvent::SelectionChanged {
                    selected: state.selection.current().to_vec(),
                });
            },
            Err(reason) => {
                tracing::debug!(%item, %reason, "selection refused");
                env.events.emit(PipelineEvent::SelectionRejected { reason });
            },
        }
    }

    // ========== Submission ==========

    fn submit(
        state: &mut ReservationState,
        guest_name: &str,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        if !state.phase.accepts_submission() {
            tracing::warn!(phase = state.phase.label(), "submission ignored, another one is in flight");
            env.events.emit(PipelineEvent::SubmissionIgnored);
            return SmallVec::new();
        }

        Self::transition(state, Phase::Validating);
        let guest_name = guest_name.trim();
        if let Err(reason) =
            validate_submission(guest_name, state.selection.current(), state.selection.max())
        {
            tracing::info!(%reason, "submission rejected");
            Self::transition(state, Phase::Rejected(reason.clone()));
            env.events.emit(PipelineEvent::Rejected { reason });
            return SmallVec::new();
        }

        Self::transition(state, Phase::Persisting);
        let submission = Submission {
            local_id: env.ids.next_id(),
            guest_name: guest_name.to_string(),
            selections: state.selection.current().to_vec(),
            submitted_at: env.clock.now(),
            outcome: None,
        };
        Self::persist(state, &submission, env);
        metrics::counter!("rsvp.submissions").increment(1);
        tracing::info!(
            local_id = %submission.local_id,
            guest = %submission.guest_name,
            selections = ?submission.selections,
            connectivity = %state.connectivity,
            "submission accepted"
        );

        let local_id = submission.local_id;
        let request = (
            submission.guest_name.clone(),
            submission.selections.clone(),
            submission.submitted_at,
        );
        state.current = Some(submission);

        if state.connectivity == Connectivity::Offline {
            return Self::enqueue_current(state, env);
        }

        Self::transition(state, Phase::Syncing);
        let sync = env.sync.clone();
        let (guest_name, selections, submitted_at) = request;
        smallvec![async_effect! {
            match sync.submit(&guest_name, &selections, submitted_at).await {
                Ok(snapshot) => Some(ReservationAction::SyncSucceeded { local_id, snapshot }),
                Err(error) => Some(ReservationAction::SyncFailed { local_id, error }),
            }
        }]
    }

    /// Writes everything a reload needs, before any remote call
    fn persist(
        state: &mut ReservationState,
        submission: &Submission,
        env: &ReservationEnvironment<R, O>,
    ) {
        let record = SessionRecord {
            nom: submission.guest_name.clone(),
            boissons: submission.selections.clone(),
            date: submission.submitted_at,
        };
        if let Err(error) = save_json(env.session.as_ref(), keys::RESERVATION_DATA, &record) {
            tracing::warn!(%error, "failed to store session record");
        }
        if let Err(error) = env.local.set(keys::INVITE_NAME, submission.guest_name.clone()) {
            tracing::warn!(%error, "failed to store guest name");
        }

        let local = env.local.as_ref();
        state.counters.add_pending(&submission.selections, local);
        state.notifications.add(&submission.selections, local);
        Self::emit_counts(state, env);
    }

    fn sync_succeeded(
        state: &mut ReservationState,
        local_id: Uuid,
        snapshot: &crate::counters::CountSnapshot,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        if !Self::is_current(state, local_id, &Phase::Syncing) {
            tracing::debug!(%local_id, "stale sync result ignored");
            return SmallVec::new();
        }

        state.counters.load_baseline(snapshot);
        if let Some(current) = state.current.as_mut() {
            state
                .counters
                .settle_pending(&current.selections, env.local.as_ref());
            current.outcome = Some(SubmissionOutcome::Synced);
        }
        Self::set_connectivity(state, Connectivity::Online, env);
        Self::transition(state, Phase::Synced);
        env.events.emit(PipelineEvent::Synced { local_id });
        Self::emit_counts(state, env);

        Self::notify(state, env)
    }

    fn sync_failed(
        state: &mut ReservationState,
        local_id: Uuid,
        error: &crate::error::SyncError,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        if !Self::is_current(state, local_id, &Phase::Syncing) {
            tracing::debug!(%local_id, "stale sync failure ignored");
            return SmallVec::new();
        }

        tracing::warn!(%local_id, %error, "sync failed, queueing reservation");
        if error.is_connectivity_failure() {
            Self::set_connectivity(state, Connectivity::Offline, env);
        }
        Self::enqueue_current(state, env)
    }

    fn enqueue_current(state: &mut ReservationState, env: &ReservationEnvironment<R, O>) -> Effects {
        let Some(current) = state.current.as_mut() else {
            return SmallVec::new();
        };
        current.outcome = Some(SubmissionOutcome::Queued);
        let pending = current.to_pending();
        let local_id = pending.local_id;

        state.queue.push(pending, env.local.as_ref());
        Self::transition(state, Phase::Queued);
        env.events.emit(PipelineEvent::Queued {
            local_id,
            queue_len: state.queue.len(),
        });

        Self::notify(state, env)
    }

    // ========== Chat hand-off ==========

    fn notify(state: &mut ReservationState, env: &ReservationEnvironment<R, O>) -> Effects {
        let Some(current) = state.current.as_ref() else {
            return SmallVec::new();
        };
        let message = OutstandingMessage {
            local_id: current.local_id,
            selections: current.selections.clone(),
            text: format_message(
                &current.guest_name,
                &current.selections,
                &state.counters,
                current.submitted_at,
            ),
        };

        Self::transition(state, Phase::Notifying);
        state.dispatching = Some(message.clone());
        Self::save_outbox(state, env);
        smallvec![Self::dispatch_effect(message, env)]
    }

    /// Writes every message still waiting for a hand-off, the running one included
    fn save_outbox(state: &ReservationState, env: &ReservationEnvironment<R, O>) {
        let mut outbox = state.undelivered.clone();
        if let Some(running) = state
            .dispatching
            .as_ref()
            .filter(|running| !outbox.iter().any(|queued| queued.local_id == running.local_id))
        {
            outbox.push(running.clone());
        }
        if let Err(error) = save_json(env.local.as_ref(), keys::UNDELIVERED_MESSAGES, &outbox) {
            tracing::warn!(%error, "failed to persist undelivered chat messages");
        }
    }

    fn dispatch_effect(
        message: OutstandingMessage,
        env: &ReservationEnvironment<R, O>,
    ) -> Effect<ReservationAction> {
        let dispatch = env.dispatch.clone();
        async_effect! {
            let handed_off = dispatch.dispatch(&message.text).await;
            Some(ReservationAction::DispatchCompleted { message, handed_off })
        }
    }

    fn dispatch_completed(
        state: &mut ReservationState,
        message: OutstandingMessage,
        handed_off: bool,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        let local_id = message.local_id;
        if state
            .dispatching
            .as_ref()
            .is_some_and(|running| running.local_id == local_id)
        {
            state.dispatching = None;
        }
        let was_undelivered = state
            .undelivered
            .iter()
            .any(|outstanding| outstanding.local_id == local_id);

        if handed_off {
            state
                .notifications
                .settle(&message.selections, env.local.as_ref());
            if was_undelivered {
                state
                    .undelivered
                    .retain(|outstanding| outstanding.local_id != local_id);
                env.events.emit(PipelineEvent::DispatchRecovered { local_id });
            }
        } else {
            tracing::warn!(%local_id, "chat hand-off blocked, keeping message for retry");
            if !was_undelivered {
                state.undelivered.push(message);
            }
            env.events.emit(PipelineEvent::DispatchBlocked { local_id });
        }
        Self::save_outbox(state, env);

        if !Self::is_current(state, local_id, &Phase::Notifying) {
            return SmallVec::new();
        }

        let Some(current) = state.current.as_ref() else {
            return SmallVec::new();
        };
        let outcome = current.outcome.unwrap_or(SubmissionOutcome::Queued);
        let guest_name = current.guest_name.clone();

        Self::transition(state, Phase::Settled(outcome));
        env.events.emit(PipelineEvent::Confirmed {
            message: confirmation_message(&guest_name, outcome),
            guest_name,
            outcome,
        });

        smallvec![delay! {
            duration: env.confirmation_delay,
            action: ReservationAction::ConfirmationElapsed { local_id }
        }]
    }

    fn retry_dispatch(state: &ReservationState, env: &ReservationEnvironment<R, O>) -> Effects {
        if state.undelivered.is_empty() {
            tracing::debug!("nothing to re-dispatch");
            return SmallVec::new();
        }

        tracing::info!(messages = state.undelivered.len(), "retrying chat hand-off");
        let attempts = state
            .undelivered
            .iter()
            .cloned()
            .map(|message| Self::dispatch_effect(message, env))
            .collect();
        smallvec![Effect::Sequential(attempts)]
    }

    fn confirmation_elapsed(
        state: &mut ReservationState,
        local_id: Uuid,
        env: &ReservationEnvironment<R, O>,
    ) {
        let settled = matches!(state.phase, Phase::Settled(_))
            && state
                .current
                .as_ref()
                .is_some_and(|current| current.local_id == local_id);
        if !settled {
            tracing::debug!(%local_id, phase = state.phase.label(), "confirmation timer outlived its submission");
            return;
        }

        Self::transition(state, Phase::Idle);
        state.current = None;
        state.selection.clear();
        env.events.emit(PipelineEvent::SelectionChanged {
            selected: Vec::new(),
        });
        env.events.emit(PipelineEvent::NavigateToInvitation);
    }

    // ========== Connectivity and queue ==========

    fn baseline_fetched(
        state: &mut ReservationState,
        outcome: &crate::sync::BaselineOutcome,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        state.counters.load_baseline(outcome.snapshot());
        Self::emit_counts(state, env);

        let connectivity = outcome.connectivity();
        Self::set_connectivity(state, connectivity, env);
        if connectivity == Connectivity::Online {
            Self::start_flush(state, env)
        } else {
            SmallVec::new()
        }
    }

    fn connectivity_probed(
        state: &mut ReservationState,
        connectivity: Connectivity,
        env: &ReservationEnvironment<R, O>,
    ) -> Effects {
        let changed = Self::set_connectivity(state, connectivity, env);
        if changed && connectivity == Connectivity::Online {
            Self::start_flush(state, env)
        } else {
            SmallVec::new()
        }
    }

    /// Sends every queued reservation, oldest first, one at a time.
    ///
    /// Each attempt's result is reduced before the next attempt starts, and a
    /// flush that is already running absorbs new triggers.
    fn start_flush(state: &mut ReservationState, env: &ReservationEnvironment<R, O>) -> Effects {
        if state.flushing {
            tracing::debug!("queue flush already running");
            return SmallVec::new();
        }
        if state.queue.is_empty() {
            return SmallVec::new();
        }

        state.flushing = true;
        state.flush_synced = 0;
        tracing::info!(queued = state.queue.len(), "flushing reservation queue");

        let mut steps: Vec<Effect<ReservationAction>> = state
            .queue
            .iter()
            .cloned()
            .map(|item| {
                let sync = env.sync.clone();
                async_effect! {
                    let local_id = item.local_id;
                    match sync.submit(&item.guest_name, &item.selections, item.submitted_at).await {
                        Ok(snapshot) => Some(ReservationAction::QueuedReservationSynced { local_id, snapshot }),
                        Err(error) => Some(ReservationAction::QueuedReservationFailed { local_id, error }),
                    }
                }
            })
            .collect();
        steps.push(async_effect! { Some(ReservationAction::FlushFinished) });

        smallvec![Effect::Sequential(steps)]
    }

    fn queued_reservation_synced(
        state: &mut ReservationState,
        local_id: Uuid,
        snapshot: &crate::counters::CountSnapshot,
        env: &ReservationEnvironment<R, O>,
    ) {
        let local = env.local.as_ref();
        let Some(item) = state.queue.remove(local_id, local) else {
            tracing::debug!(%local_id, "synced entry no longer queued");
            return;
        };

        state.counters.load_baseline(snapshot);
        state.counters.settle_pending(&item.selections, local);
        state.flush_synced += 1;
        metrics::counter!("rsvp.queue.flushed").increment(1);
        tracing::info!(%local_id, guest = %item.guest_name, remaining = state.queue.len(), "queued reservation synced");

        Self::set_connectivity(state, Connectivity::Online, env);
        env.events.emit(PipelineEvent::QueuedReservationSynced { local_id });
        Self::emit_counts(state, env);
    }

    fn queued_reservation_failed(
        state: &mut ReservationState,
        local_id: Uuid,
        error: &crate::error::SyncError,
        env: &ReservationEnvironment<R, O>,
    ) {
        tracing::warn!(%local_id, %error, "queued reservation still not synced");
        if error.is_connectivity_failure() {
            Self::set_connectivity(state, Connectivity::Offline, env);
        }
    }

    fn flush_finished(state: &mut ReservationState, env: &ReservationEnvironment<R, O>) {
        state.flushing = false;
        tracing::info!(synced = state.flush_synced, remaining = state.queue.len(), "queue flush finished");
        env.events.emit(PipelineEvent::QueueFlushed {
            synced: state.flush_synced,
            remaining: state.queue.len(),
        });
    }
}

impl<R: RemoteCounterService, O: DeepLinkOpener> Reducer for ReservationReducer<R, O> {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment<R, O>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            ReservationAction::PageLoaded => Self::load_page(state, env),

            ReservationAction::ToggleItem { item } => {
                Self::toggle(state, item, env);
                SmallVec::new()
            },

            ReservationAction::Submit { guest_name } => Self::submit(state, &guest_name, env),

            ReservationAction::FlushQueue => Self::start_flush(state, env),

            ReservationAction::ProbeConnectivity => {
                let sync = env.sync.clone();
                smallvec![async_effect! {
                    Some(ReservationAction::ConnectivityProbed {
                        connectivity: sync.probe_connectivity().await,
                    })
                }]
            },

            ReservationAction::RetryDispatch => Self::retry_dispatch(state, env),

            // ========== Feedback ==========
            ReservationAction::BaselineFetched { outcome } => {
                Self::baseline_fetched(state, &outcome, env)
            },

            ReservationAction::SyncSucceeded { local_id, snapshot } => {
                Self::sync_succeeded(state, local_id, &snapshot, env)
            },

            ReservationAction::SyncFailed { local_id, error } => {
                Self::sync_failed(state, local_id, &error, env)
            },

            ReservationAction::DispatchCompleted {
                message,
                handed_off,
            } => Self::dispatch_completed(state, message, handed_off, env),

            ReservationAction::ConfirmationElapsed { local_id } => {
                Self::confirmation_elapsed(state, local_id, env);
                SmallVec::new()
            },

            ReservationAction::ConnectivityProbed { connectivity } => {
                Self::connectivity_probed(state, connectivity, env)
            },

            ReservationAction::QueuedReservationSynced { local_id, snapshot } => {
                Self::queued_reservation_synced(state, local_id, &snapshot, env);
                SmallVec::new()
            },

            ReservationAction::QueuedReservationFailed { local_id, error } => {
                Self::queued_reservation_failed(state, local_id, &error, env);
                SmallVec::new()
            },

            ReservationAction::FlushFinished => {
                Self::flush_finished(state, env);
                SmallVec::new()
            },
        }
    }
}
