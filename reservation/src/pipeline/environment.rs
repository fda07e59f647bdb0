//! Dependencies injected into the reservation reducer.

use super::types::PipelineEvent;
use crate::notification::NotificationDispatch;
use crate::storage::KeyValueStore;
use crate::sync::RemoteSync;
use rsvp_core::environment::Clock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Source of local submission ids
pub trait IdGenerator: Send + Sync {
    /// A fresh id
    fn next_id(&self) -> Uuid;
}

/// Random v4 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Broadcast channel carrying [`PipelineEvent`]s to the presentation layer.
///
/// Emitting never blocks and never fails; with no subscriber the event is
/// dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventSink {
    /// Sink buffering up to `capacity` events per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event
    pub fn emit(&self, event: PipelineEvent) {
        tracing::trace!(?event, "pipeline event");
        let _ = self.sender.send(event);
    }

    /// New subscription, receiving events emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Environment for [`super::ReservationReducer`].
///
/// Storage is synchronous and written through inside the reducer; the remote
/// service and the chat opener are only reached from effects.
pub struct ReservationEnvironment<R, O> {
    /// Timestamps for submissions
    pub clock: Arc<dyn Clock>,
    /// Local submission ids
    pub ids: Arc<dyn IdGenerator>,
    /// Durable store (ledgers, queue, cached counts, last guest name)
    pub local: Arc<dyn KeyValueStore>,
    /// Session store (record read back by the invitation page)
    pub session: Arc<dyn KeyValueStore>,
    /// Counter service access
    pub sync: RemoteSync<R>,
    /// Chat hand-off
    pub dispatch: NotificationDispatch<O>,
    /// Presentation events
    pub events: EventSink,
    /// How long the confirmation stays up before navigating away
    pub confirmation_delay: Duration,
}

impl<R, O> Clone for ReservationEnvironment<R, O> {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            local: Arc::clone(&self.local),
            session: Arc::clone(&self.session),
            sync: self.sync.clone(),
            dispatch: self.dispatch.clone(),
            events: self.events.clone(),
            confirmation_delay: self.confirmation_delay,
        }
    }
}

impl<R, O> fmt::Debug for ReservationEnvironment<R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservationEnvironment")
            .field("sync", &self.sync)
            .field("dispatch", &self.dispatch)
            .field("confirmation_delay", &self.confirmation_delay)
            .finish_non_exhaustive()
    }
}
