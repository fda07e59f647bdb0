//! # RSVP Reservation
//!
//! Offline-tolerant reservation pipeline for the wedding website.
//!
//! A guest picks up to two beverages, enters a name and submits. The page
//! writes the choice to local storage, tries the remote counter service, falls
//! back to a durable queue when the service is unreachable, and hands a summary
//! to the couple's chat through a deep link. Counts on screen always include
//! the guest's own unconfirmed selections.
//!
//! ## Layout
//!
//! - [`catalog`], [`selection`]: what can be chosen
//! - [`counters`], [`queue`], [`storage`]: local, durable bookkeeping
//! - [`remote`], [`sync`]: the counter service and connectivity
//! - [`notification`]: chat hand-off
//! - [`pipeline`]: the reducer tying it together
//! - [`app`]: a page owning one store and its probe timer
//! - [`guestbook`], [`invitation`]: the neighbouring pages
//!
//! ## Example
//!
//! ```ignore
//! let env = environment_from_config(&config, Arc::new(LogOpener), local, session)?;
//! let mut events = env.events.subscribe();
//! let page = ReservationPage::open(ReservationState::default(), env, config.probe_interval()).await?;
//!
//! page.toggle("Coca").await?;
//! page.submit("Jo").await?;
//! ```

pub mod app;
pub mod catalog;
pub mod config;
pub mod counters;
pub mod error;
pub mod guestbook;
pub mod invitation;
pub mod mocks;
pub mod notification;
pub mod pipeline;
pub mod queue;
pub mod remote;
pub mod selection;
pub mod storage;
pub mod sync;

pub use app::{ReservationPage, ReservationStore, environment_from_config};
pub use catalog::{Catalog, CatalogItem, Category};
pub use config::ReservationConfig;
pub use counters::{CountSnapshot, CounterEntry, CounterStore, ItemCount, PendingLedger};
pub use error::{
    ConfigError, GuestbookError, SelectionError, StorageError, SyncError, ValidationError,
};
pub use notification::{
    DeepLinkOpener, DeepLinkTarget, LogOpener, NotificationDispatch, SystemOpener, format_message,
};
pub use pipeline::{
    EventSink, Phase, PipelineEvent, ReservationAction, ReservationEnvironment, ReservationReducer,
    ReservationState, SubmissionOutcome,
};
pub use queue::{PendingReservation, ReservationQueue};
pub use remote::{HttpCounterService, RemoteCounterService, ReservationRequest};
pub use selection::{MAX_SELECTIONS, SelectionState, Toggle};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use sync::{BaselineOutcome, Connectivity, RemoteSync};
