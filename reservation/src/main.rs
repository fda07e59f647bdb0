//! `rsvp`: drive the reservation page from a terminal.
//!
//! Set `RSVP_OPENER=log` on hosts without a desktop to log chat links instead
//! of opening them.

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use rsvp_core::environment::{Clock, SystemClock};
use rsvp_reservation::guestbook::{self, Guestbook};
use rsvp_reservation::invitation::InvitationContext;
use rsvp_reservation::{
    DeepLinkOpener, FileStore, KeyValueStore, LogOpener, MemoryStore, NotificationDispatch,
    PipelineEvent, ReservationConfig, ReservationPage, ReservationState, SystemOpener,
    environment_from_config,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "rsvp")]
#[command(about = "Beverage reservations for the wedding of Blessing & Tevin")]
#[command(version)]
struct Cli {
    /// What to do
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Reserve one or two beverages for a guest
    Reserve {
        /// Guest name
        name: String,
        /// Beverages, as listed in the catalog
        #[arg(required = true, num_args = 1..=2)]
        beverages: Vec<String>,
    },
    /// Show counts per beverage
    Counts,
    /// Send reservations queued on this device
    Flush,
    /// Read or sign the guestbook
    Guestbook {
        /// Guestbook action
        #[command(subcommand)]
        action: GuestbookAction,
    },
    /// Show the invitation greeting for the last guest
    Invitation,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum GuestbookAction {
    /// List messages, newest first
    List,
    /// Leave a message
    Post {
        /// Author
        name: String,
        /// Message text
        message: String,
        /// Also send it to the couple on WhatsApp
        #[arg(long)]
        forward: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rsvp_reservation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ReservationConfig::from_env();
    info!(
        service_url = %config.service.url,
        storage = %config.local_store_path().display(),
        "Configuration loaded"
    );

    if std::env::var("RSVP_OPENER").is_ok_and(|opener| opener == "log") {
        run(&config, Arc::new(LogOpener), cli.command).await
    } else {
        run(&config, Arc::new(SystemOpener::new()), cli.command).await
    }
}

async fn run<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    command: Command,
) -> anyhow::Result<()> {
    let local: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(config.local_store_path()).context("opening local storage")?,
    );
    let session: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    match command {
        Command::Reserve { name, beverages } => {
            reserve(config, opener, local, session, &name, &beverages).await
        },
        Command::Counts => counts(config, opener, local, session).await,
        Command::Flush => flush(config, opener, local, session).await,
        Command::Guestbook {
            action: GuestbookAction::List,
        } => {
            for entry in Guestbook::new(local).entries() {
                println!(
                    "{}  {}: {}",
                    entry.date.format("%d/%m/%Y %H:%M"),
                    entry.nom,
                    entry.message
                );
            }
            Ok(())
        },
        Command::Guestbook {
            action:
                GuestbookAction::Post {
                    name,
                    message,
                    forward,
                },
        } => post_guestbook(config, opener, local, &name, &message, forward).await,
        Command::Invitation => {
            println!("{}", InvitationContext::load(session.as_ref(), local.as_ref()).greeting());
            Ok(())
        },
    }
}

async fn open_page<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> anyhow::Result<(
    ReservationPage<rsvp_reservation::HttpCounterService, O>,
    broadcast::Receiver<PipelineEvent>,
)> {
    let env = environment_from_config(config, opener, local, session)?;
    let events = env.events.subscribe();
    let state = ReservationState::new(config.catalog()?, config.page.max_selections);
    let page = ReservationPage::open(state, env, config.probe_interval()).await?;
    Ok((page, events))
}

async fn next_event<F>(
    events: &mut broadcast::Receiver<PipelineEvent>,
    timeout: Duration,
    matches: F,
) -> anyhow::Result<PipelineEvent>
where
    F: Fn(&PipelineEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return Ok(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow!("event channel closed"));
                },
            }
        }
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for the page"))?
}

fn patience(config: &ReservationConfig) -> Duration {
    config.sync_timeout() + config.dispatch_timeout() + config.confirmation_delay() + Duration::from_secs(5)
}

async fn reserve<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    name: &str,
    beverages: &[String],
) -> anyhow::Result<()> {
    let (page, mut events) =
        open_page(config, opener, Arc::clone(&local), Arc::clone(&session)).await?;

    for beverage in beverages {
        page.toggle(beverage.as_str()).await?;
    }
    let selected = page.read(|s| s.selection.current().to_vec()).await;
    println!("Boissons : {}", selected.join(", "));

    page.submit(name).await?;
    let outcome = next_event(&mut events, patience(config), |event| {
        matches!(
            event,
            PipelineEvent::Rejected { .. } | PipelineEvent::Confirmed { .. }
        )
    })
    .await?;

    match outcome {
        PipelineEvent::Rejected { reason } => {
            page.close(Duration::from_secs(1)).await.ok();
            bail!("{reason}");
        },
        PipelineEvent::Confirmed { message, .. } => println!("{message}"),
        _ => {},
    }

    let undelivered = page.read(|s| s.undelivered.len()).await;
    if undelivered > 0 {
        println!("Le message WhatsApp n'a pas pu être ouvert ; nouvelle tentative...");
        page.retry_dispatch().await?;
    }

    next_event(&mut events, patience(config), |event| {
        matches!(event, PipelineEvent::NavigateToInvitation)
    })
    .await?;
    println!(
        "{}",
        InvitationContext::load(session.as_ref(), local.as_ref()).greeting()
    );

    page.close(patience(config)).await?;
    Ok(())
}

async fn counts<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> anyhow::Result<()> {
    let (page, mut events) = open_page(config, opener, local, session).await?;

    // restored counts first, then the baseline answer
    for _ in 0..2 {
        next_event(&mut events, patience(config), |event| {
            matches!(event, PipelineEvent::CountsUpdated { .. })
        })
        .await?;
    }

    let (rows, connectivity, queued) = page
        .read(|s| {
            let rows: Vec<_> = s
                .catalog
                .iter()
                .map(|item| {
                    (item.name.clone(), item.category.to_string(), s.counters.entry(&item.name))
                })
                .collect();
            (rows, s.connectivity, s.queue.len())
        })
        .await;

    println!("Service : {connectivity}, en attente : {queued}");
    for (name, category, entry) in rows {
        println!(
            "{name:<16} {category:<10} {:>4}  (confirmés {}, en attente {})",
            entry.display_count(),
            entry.server_count,
            entry.pending_count
        );
    }

    page.close(Duration::from_secs(1)).await?;
    Ok(())
}

async fn flush<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> anyhow::Result<()> {
    let (page, mut events) = open_page(config, opener, local, session).await?;

    if page.read(|s| s.queue.is_empty()).await {
        println!("Aucune réservation en attente.");
        page.close(patience(config)).await?;
        return Ok(());
    }

    page.flush().await?;
    let queued = page.read(|s| s.queue.len()).await;
    let timeout = patience(config) * u32::try_from(queued.max(1)).unwrap_or(u32::MAX);
    if let PipelineEvent::QueueFlushed { synced, remaining } =
        next_event(&mut events, timeout, |event| {
            matches!(event, PipelineEvent::QueueFlushed { .. })
        })
        .await?
    {
        println!("{synced} réservation(s) envoyée(s), {remaining} toujours en attente.");
    }

    page.close(patience(config)).await?;
    Ok(())
}

async fn post_guestbook<O: DeepLinkOpener>(
    config: &ReservationConfig,
    opener: Arc<O>,
    local: Arc<dyn KeyValueStore>,
    name: &str,
    message: &str,
    forward: bool,
) -> anyhow::Result<()> {
    let now = SystemClock.now();
    let entry = Guestbook::new(local).post(name, message, now)?;
    println!("Message enregistré, merci {} !", entry.nom);

    if forward {
        let dispatch =
            NotificationDispatch::new(opener, config.deep_link_target(), config.dispatch_timeout());
        if guestbook::forward(&dispatch, name, message, now).await? {
            println!("Message transmis sur WhatsApp.");
        } else {
            println!("Veuillez autoriser l'ouverture de WhatsApp puis réessayer.");
        }
    }
    Ok(())
}
