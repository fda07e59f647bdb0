//! Hand-off of reservation summaries to the couple's chat.
//!
//! There is no delivery acknowledgement. A successful hand-off only means the
//! link was opened; the notification ledger tracks selections whose summary
//! has not been handed off yet.

use crate::counters::CounterStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Signature line closing every message
pub const WEDDING_TITLE: &str = "Mariage de Blessing & Tevin";

/// Builds the reservation summary sent to the chat.
///
/// Pure: equal inputs give equal output. Counts shown are the display counts
/// at formatting time.
#[must_use]
pub fn format_message(
    guest_name: &str,
    selections: &[String],
    counters: &CounterStore,
    at: DateTime<Utc>,
) -> String {
    let lines: Vec<String> = selections
        .iter()
        .map(|item| format!("• {item} (total : {})", counters.display_count(item)))
        .collect();

    format!(
        "🎉 *NOUVELLE RÉSERVATION* 🎉\n\n\
         👤 *Nom*: {guest_name}\n\n\
         🥂 *Boissons*:\n{}\n\n\
         📅 *Date*: {}\n\n\
         💍 *{WEDDING_TITLE}*",
        lines.join("\n"),
        at.format("%d/%m/%Y %H:%M"),
    )
}

/// Where deep links point: `{base}?{recipient_param}={recipient}&text={message}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLinkTarget {
    /// Scheme and path, e.g. `https://api.whatsapp.com/send`
    pub base: String,
    /// Query parameter carrying the recipient
    pub recipient_param: String,
    /// Recipient phone number in international format, digits only
    pub recipient: String,
}

impl DeepLinkTarget {
    /// Link that opens a chat with `message` prefilled
    #[must_use]
    pub fn url_for(&self, message: &str) -> String {
        format!(
            "{}?{}={}&text={}",
            self.base,
            self.recipient_param,
            urlencoding::encode(&self.recipient),
            urlencoding::encode(message),
        )
    }
}

impl Default for DeepLinkTarget {
    fn default() -> Self {
        Self {
            base: "https://api.whatsapp.com/send".to_string(),
            recipient_param: "phone".to_string(),
            recipient: "243829225086".to_string(),
        }
    }
}

/// Opens a deep link outside this process.
///
/// Returns `false` when the hand-off itself was refused.
pub trait DeepLinkOpener: Send + Sync + 'static {
    /// Opens `url`
    fn open(&self, url: &str) -> impl Future<Output = bool> + Send;
}

/// Opens links with the platform's URL handler
#[derive(Clone, Debug)]
pub struct SystemOpener {
    program: String,
    args: Vec<String>,
}

impl SystemOpener {
    /// Opener for the current platform
    #[must_use]
    pub fn new() -> Self {
        if cfg!(target_os = "macos") {
            Self::with_command("open", &[])
        } else if cfg!(target_os = "windows") {
            Self::with_command("cmd", &["/C", "start", ""])
        } else {
            Self::with_command("xdg-open", &[])
        }
    }

    /// Opener running `program args... <url>`
    #[must_use]
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }
}

impl Default for SystemOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl DeepLinkOpener for SystemOpener {
    async fn open(&self, url: &str) -> bool {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!(program = %self.program, %status, "URL opener refused the link");
                false
            },
            Err(error) => {
                tracing::warn!(program = %self.program, %error, "URL opener could not be started");
                false
            },
        }
    }
}

/// Records the link in the logs instead of opening it.
///
/// Used on headless hosts, where an operator forwards logged links by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOpener;

impl DeepLinkOpener for LogOpener {
    async fn open(&self, url: &str) -> bool {
        tracing::info!(%url, "chat link ready");
        true
    }
}

/// Formats nothing itself; opens links for preformatted messages within a
/// wait window.
pub struct NotificationDispatch<O> {
    opener: Arc<O>,
    target: DeepLinkTarget,
    timeout: Duration,
}

impl<O> Clone for NotificationDispatch<O> {
    fn clone(&self) -> Self {
        Self {
            opener: Arc::clone(&self.opener),
            target: self.target.clone(),
            timeout: self.timeout,
        }
    }
}

impl<O> fmt::Debug for NotificationDispatch<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatch")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<O: DeepLinkOpener> NotificationDispatch<O> {
    /// Dispatcher sending to `target` through `opener`
    #[must_use]
    pub const fn new(opener: Arc<O>, target: DeepLinkTarget, timeout: Duration) -> Self {
        Self {
            opener,
            target,
            timeout,
        }
    }

    /// Link target
    #[must_use]
    pub const fn target(&self) -> &DeepLinkTarget {
        &self.target
    }

    /// Hands `message` off. `true` is not proof of delivery.
    pub async fn dispatch(&self, message: &str) -> bool {
        let url = self.target.url_for(message);
        match tokio::time::timeout(self.timeout, self.opener.open(&url)).await {
            Ok(true) => {
                tracing::debug!("chat hand-off accepted");
                true
            },
            Ok(false) => {
                tracing::warn!("chat hand-off blocked");
                false
            },
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis(), "chat hand-off timed out");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::counters::CountSnapshot;
    use crate::mocks::MockOpener;
    use crate::storage::{MemoryStore, keys};
    use rsvp_core::environment::Clock;
    use rsvp_testing::test_clock;

    fn counters() -> CounterStore {
        let mut counters = CounterStore::new(&Catalog::default_beverages(), keys::PENDING_COUNTS);
        counters.load_baseline(&CountSnapshot::new().with("Coca", 4));
        counters
    }

    #[test]
    fn message_lists_guest_items_and_totals() {
        let message = format_message("Jo", &["Coca".to_string()], &counters(), test_clock().now());
        assert!(message.contains("*Nom*: Jo"));
        assert!(message.contains("• Coca (total : 4)"));
        assert!(message.contains("14/06/2025 15:00"));
        assert!(message.ends_with("💍 *Mariage de Blessing & Tevin*"));
    }

    #[test]
    fn message_is_stable_for_equal_inputs() {
        let counters = counters();
        let selections = ["Coca".to_string(), "Eau".to_string()];
        let at = test_clock().now();
        assert_eq!(
            format_message("Jo", &selections, &counters, at),
            format_message("Jo", &selections, &counters, at)
        );
    }

    #[test]
    fn pending_selections_count_toward_totals() {
        let storage = MemoryStore::new();
        let mut counters = counters();
        counters.add_pending(&["Coca".to_string()], &storage);
        let message = format_message("Jo", &["Coca".to_string()], &counters, test_clock().now());
        assert!(message.contains("• Coca (total : 5)"));
    }

    #[test]
    fn url_encodes_the_message() {
        let url = DeepLinkTarget::default().url_for("Merci & à bientôt");
        assert_eq!(
            url,
            "https://api.whatsapp.com/send?phone=243829225086&text=Merci%20%26%20%C3%A0%20bient%C3%B4t"
        );
    }

    #[tokio::test]
    async fn blocked_opener_reports_false() {
        let opener = Arc::new(MockOpener::blocked());
        let dispatch = NotificationDispatch::new(
            Arc::clone(&opener),
            DeepLinkTarget::default(),
            Duration::from_millis(50),
        );

        assert!(!dispatch.dispatch("hello").await);
        assert_eq!(opener.opened().len(), 1);
    }

    #[tokio::test]
    async fn slow_opener_counts_as_blocked() {
        let opener = Arc::new(MockOpener::new());
        opener.set_latency(Duration::from_millis(500));
        let dispatch = NotificationDispatch::new(opener, DeepLinkTarget::default(), Duration::from_millis(20));

        assert!(!dispatch.dispatch("hello").await);
    }

    #[tokio::test]
    async fn log_opener_always_hands_off() {
        let dispatch = NotificationDispatch::new(
            Arc::new(LogOpener),
            DeepLinkTarget::default(),
            Duration::from_millis(50),
        );
        assert!(dispatch.dispatch("hello").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_opener_reports_command_failure() {
        let opener = SystemOpener::with_command("false", &[]);
        assert!(!opener.open("https://example.com").await);
        let missing = SystemOpener::with_command("rsvp-no-such-opener", &[]);
        assert!(!missing.open("https://example.com").await);
    }
}
