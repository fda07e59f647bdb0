//! End-to-end tests for a reservation page running on the real store.
//!
//! The counter service and the chat opener are in-memory mocks; storage is
//! either in memory or a JSON file in a temporary directory.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use rsvp_reservation::invitation::InvitationContext;
use rsvp_reservation::mocks::{MockCounterService, MockOpener, SequentialIds};
use rsvp_reservation::storage::{keys, load_json};
use rsvp_reservation::{
    CountSnapshot, Connectivity, DeepLinkTarget, EventSink, FileStore, KeyValueStore, MemoryStore,
    NotificationDispatch, PendingReservation, Phase, PipelineEvent, RemoteSync, ReservationEnvironment,
    ReservationPage, ReservationState, SubmissionOutcome,
};
use rsvp_testing::{init_test_logging, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(2);
const NO_PROBE: Duration = Duration::from_secs(3600);

type Page = ReservationPage<MockCounterService, MockOpener>;

fn environment(
    remote: &Arc<MockCounterService>,
    opener: &Arc<MockOpener>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> ReservationEnvironment<MockCounterService, MockOpener> {
    ReservationEnvironment {
        clock: Arc::new(test_clock()),
        ids: Arc::new(SequentialIds::new()),
        sync: RemoteSync::new(Arc::clone(remote), Arc::clone(&local), Duration::from_millis(300)),
        dispatch: NotificationDispatch::new(
            Arc::clone(opener),
            DeepLinkTarget::default(),
            Duration::from_millis(300),
        ),
        local,
        session,
        events: EventSink::default(),
        confirmation_delay: Duration::from_millis(20),
    }
}

async fn open(
    remote: &Arc<MockCounterService>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    probe_interval: Duration,
) -> (Page, broadcast::Receiver<PipelineEvent>) {
    init_test_logging();
    let env = environment(remote, &Arc::new(MockOpener::new()), local, session);
    let events = env.events.subscribe();
    let page = ReservationPage::open(ReservationState::default(), env, probe_interval)
        .await
        .unwrap();
    (page, events)
}

/// Waits for the first event matching `pred`, skipping the others
async fn wait_for<F>(events: &mut broadcast::Receiver<PipelineEvent>, mut pred: F) -> PipelineEvent
where
    F: FnMut(&PipelineEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for pipeline event")
}

#[tokio::test]
async fn online_submission_confirms_and_navigates() {
    let remote = Arc::new(MockCounterService::with_counts(
        CountSnapshot::new().with("Coca", 4),
    ));
    let local = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let (page, mut events) = open(&remote, local.clone(), session.clone(), NO_PROBE).await;

    wait_for(&mut events, |event| {
        matches!(event, PipelineEvent::CountsUpdated { counts } if counts.get("Coca") == Some(&4))
    })
    .await;

    page.toggle("Coca").await.unwrap();
    page.submit("Jo").await.unwrap();

    let confirmed = wait_for(&mut events, |event| matches!(event, PipelineEvent::Confirmed { .. })).await;
    let PipelineEvent::Confirmed { guest_name, outcome, message } = confirmed else {
        unreachable!()
    };
    assert_eq!(guest_name, "Jo");
    assert_eq!(outcome, SubmissionOutcome::Synced);
    assert!(message.contains("Jo"));

    wait_for(&mut events, |event| *event == PipelineEvent::NavigateToInvitation).await;

    let (phase, server, pending) = page
        .read(|state| {
            (
                state.phase.clone(),
                state.counters.server_count("Coca"),
                state.counters.pending_count("Coca"),
            )
        })
        .await;
    assert_eq!(phase, Phase::Idle);
    assert_eq!(server, 5);
    assert_eq!(pending, 0);

    let invitation = InvitationContext::load(session.as_ref(), local.as_ref());
    assert_eq!(invitation.guest_name.as_deref(), Some("Jo"));
    assert_eq!(invitation.beverages, ["Coca"]);

    page.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn offline_submission_is_queued_then_flushed() {
    let remote = Arc::new(MockCounterService::new());
    remote.set_reachable(false);
    let local = Arc::new(MemoryStore::new());
    let (page, mut events) = open(&remote, local.clone(), Arc::new(MemoryStore::new()), NO_PROBE).await;

    wait_for(&mut events, |event| {
        *event
            == PipelineEvent::ConnectivityChanged {
                connectivity: Connectivity::Offline,
            }
    })
    .await;

    page.toggle("Coca").await.unwrap();
    page.toggle("Champagne").await.unwrap();
    page.submit("Amani").await.unwrap();

    let confirmed = wait_for(&mut events, |event| matches!(event, PipelineEvent::Confirmed { .. })).await;
    assert!(matches!(
        confirmed,
        PipelineEvent::Confirmed { outcome: SubmissionOutcome::Queued, .. }
    ));

    let stored: Vec<PendingReservation> =
        load_json(local.as_ref(), keys::PENDING_RESERVATIONS).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].selections, ["Coca", "Champagne"]);

    let display = page.read(|state| state.counters.display_count("Champagne")).await;
    assert_eq!(display, 1);

    remote.set_reachable(true);
    page.flush().await.unwrap();
    wait_for(&mut events, |event| {
        *event == PipelineEvent::QueueFlushed { synced: 1, remaining: 0 }
    })
    .await;

    let (queued, pending, server) = page
        .read(|state| {
            (
                state.queue.len(),
                state.counters.pending_count("Champagne"),
                state.counters.server_count("Champagne"),
            )
        })
        .await;
    assert_eq!(queued, 0);
    assert_eq!(pending, 0);
    assert_eq!(server, 1);
    assert_eq!(remote.requests()[0].name, "Amani");

    page.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn probe_flushes_queue_when_service_returns() {
    let remote = Arc::new(MockCounterService::new());
    remote.set_reachable(false);
    let (page, mut events) = open(
        &remote,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        Duration::from_millis(25),
    )
    .await;

    page.toggle("Eau").await.unwrap();
    page.submit("Jo").await.unwrap();
    wait_for(&mut events, |event| matches!(event, PipelineEvent::Queued { .. })).await;

    remote.set_reachable(true);
    wait_for(&mut events, |event| {
        *event
            == PipelineEvent::ConnectivityChanged {
                connectivity: Connectivity::Online,
            }
    })
    .await;
    wait_for(&mut events, |event| {
        matches!(event, PipelineEvent::QueueFlushed { synced: 1, remaining: 0 })
    })
    .await;

    assert_eq!(remote.counts().count("Eau"), 1);
    page.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn second_submit_while_syncing_is_ignored() {
    let remote = Arc::new(MockCounterService::new());
    remote.set_latency(Duration::from_millis(100));
    let (page, mut events) = open(
        &remote,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        NO_PROBE,
    )
    .await;

    page.toggle("Fanta").await.unwrap();
    page.submit("Jo").await.unwrap();
    page.submit("Jo").await.unwrap();

    wait_for(&mut events, |event| *event == PipelineEvent::SubmissionIgnored).await;
    wait_for(&mut events, |event| matches!(event, PipelineEvent::Confirmed { .. })).await;

    assert_eq!(remote.requests().len(), 1);
    assert_eq!(remote.counts().count("Fanta"), 1);
    page.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn queue_survives_a_page_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.json");

    let offline = Arc::new(MockCounterService::new());
    offline.set_reachable(false);
    {
        let local: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
        let (page, mut events) = open(&offline, local, Arc::new(MemoryStore::new()), NO_PROBE).await;

        page.toggle("Vin rouge").await.unwrap();
        page.submit("Amani").await.unwrap();
        wait_for(&mut events, |event| matches!(event, PipelineEvent::Confirmed { .. })).await;
        page.close(WAIT).await.unwrap();
    }

    let online = Arc::new(MockCounterService::new());
    let local: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
    let (page, mut events) = open(&online, local, Arc::new(MemoryStore::new()), NO_PROBE).await;

    wait_for(&mut events, |event| {
        *event == PipelineEvent::QueueFlushed { synced: 1, remaining: 0 }
    })
    .await;

    let requests = online.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "Amani");
    assert_eq!(requests[0].selected_boissons, ["Vin rouge"]);
    assert!(offline.requests().is_empty());

    let pending = page.read(|state| state.counters.pending().total()).await;
    assert_eq!(pending, 0);
    page.close(WAIT).await.unwrap();
}
