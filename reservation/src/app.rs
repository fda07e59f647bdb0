//! Page-level wiring: one store, one probe timer, explicit lifetimes.

use crate::config::ReservationConfig;
use crate::error::ConfigError;
use crate::notification::{DeepLinkOpener, NotificationDispatch};
use crate::pipeline::{
    EventSink, PipelineEvent, RandomIds, ReservationAction, ReservationEnvironment,
    ReservationReducer, ReservationState,
};
use crate::remote::{HttpCounterService, RemoteCounterService};
use crate::storage::KeyValueStore;
use crate::sync::RemoteSync;
use rsvp_core::environment::SystemClock;
use rsvp_runtime::{EffectHandle, PeriodicTask, Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Store type driving a reservation page
pub type ReservationStore<R, O> = Store<
    ReservationState,
    ReservationAction,
    ReservationEnvironment<R, O>,
    ReservationReducer<R, O>,
>;

/// Builds the production environment: HTTP counter service, system clock,
/// random ids.
///
/// # Errors
///
/// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
pub fn environment_from_config<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> Result<ReservationEnvironment<HttpCounterService, O>, ConfigError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("rsvp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
    let service = Arc::new(HttpCounterService::with_client(client, config.service.url.clone()));

    Ok(ReservationEnvironment {
        clock: Arc::new(SystemClock),
        ids: Arc::new(RandomIds),
        sync: RemoteSync::new(service, Arc::clone(&local), config.sync_timeout()),
        dispatch: NotificationDispatch::new(
            opener,
            config.deep_link_target(),
            config.dispatch_timeout(),
        ),
        local,
        session,
        events: EventSink::default(),
        confirmation_delay: config.confirmation_delay(),
    })
}

/// A live reservation page.
///
/// Opening the page restores local state, fetches counts and starts the
/// connectivity probe; closing it stops the probe and drains running effects.
/// Subscribe to `env.events` before [`ReservationPage::open`] to observe the
/// page-load events too.
pub struct ReservationPage<R: RemoteCounterService, O: DeepLinkOpener> {
    store: ReservationStore<R, O>,
    probe: Option<PeriodicTask>,
}

impl<R: RemoteCounterService, O: DeepLinkOpener> ReservationPage<R, O> {
    /// Opens the page.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store rejects the page-load action.
    pub async fn open(
        state: ReservationState,
        env: ReservationEnvironment<R, O>,
        probe_interval: Duration,
    ) -> Result<Self, StoreError> {
        let store = Store::new(state, ReservationReducer::new(), env);
        store.send(ReservationAction::PageLoaded).await?;

        let probe_store = store.clone();
        let probe = PeriodicTask::start("connectivity-probe", probe_interval, move || {
            let store = probe_store.clone();
            async move {
                if let Err(error) = store.send(ReservationAction::ProbeConnectivity).await {
                    tracing::debug!(%error, "connectivity probe skipped");
                }
            }
        });

        Ok(Self {
            store,
            probe: Some(probe),
        })
    }

    /// Presentation events from now on
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.store.environment().events.subscribe()
    }

    /// Toggles a beverage
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] once the page is closing.
    pub async fn toggle(&self, item: impl Into<String>) -> Result<(), StoreError> {
        self.store
            .send(ReservationAction::ToggleItem { item: item.into() })
            .await
            .map(drop)
    }

    /// Submits the form
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] once the page is closing.
    pub async fn submit(&self, guest_name: impl Into<String>) -> Result<EffectHandle, StoreError> {
        self.store
            .send(ReservationAction::Submit {
                guest_name: guest_name.into(),
            })
            .await
    }

    /// Sends queued reservations now
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] once the page is closing.
    pub async fn flush(&self) -> Result<EffectHandle, StoreError> {
        self.store.send(ReservationAction::FlushQueue).await
    }

    /// Retries refused chat hand-offs
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] once the page is closing.
    pub async fn retry_dispatch(&self) -> Result<EffectHandle, StoreError> {
        self.store.send(ReservationAction::RetryDispatch).await
    }

    /// Reads page state
    pub async fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&ReservationState) -> T,
    {
        self.store.state(f).await
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &ReservationStore<R, O> {
        &self.store
    }

    /// Stops the probe and waits up to `timeout` for running effects.
    ///
    /// Abandoning a submission mid-sync is safe: everything needed to resume
    /// is already in durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running.
    pub async fn close(mut self, timeout: Duration) -> Result<(), StoreError> {
        if let Some(probe) = self.probe.take() {
            probe.stop().await;
        }
        self.store.shutdown(timeout).await
    }
}
