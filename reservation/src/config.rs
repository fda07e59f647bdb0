//! Configuration for the reservation page.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::catalog::Catalog;
use crate::error::ConfigError;
use crate::notification::DeepLinkTarget;
use crate::selection::MAX_SELECTIONS;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Page configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// Counter service
    pub service: ServiceConfig,
    /// Chat hand-off
    pub chat: ChatConfig,
    /// Page behavior and local storage
    pub page: PageConfig,
}

/// Counter service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service root URL
    pub url: String,
    /// Wait window per call, in milliseconds
    pub timeout_ms: u64,
    /// Seconds between connectivity probes
    pub probe_interval_secs: u64,
}

/// Chat deep-link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Recipient phone number, international format, digits only
    pub recipient: String,
    /// Link base, e.g. `https://api.whatsapp.com/send`
    pub deep_link_base: String,
    /// Query parameter naming the recipient
    pub recipient_param: String,
    /// Wait window for the hand-off, in milliseconds
    pub dispatch_timeout_ms: u64,
}

/// Page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Directory holding the durable store
    pub storage_dir: PathBuf,
    /// Confirmation display time before navigating, in milliseconds
    pub confirmation_delay_ms: u64,
    /// Beverage cap per guest, between 1 and [`MAX_SELECTIONS`]
    pub max_selections: usize,
    /// Catalog override, `name:category` entries separated by commas
    pub catalog: Option<String>,
}

impl ReservationConfig {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(default)
        };
        let defaults = DeepLinkTarget::default();

        Self {
            service: ServiceConfig {
                url: lookup("RSVP_SERVICE_URL")
                    .unwrap_or_else(|| "http://localhost:8787/api".to_string()),
                timeout_ms: parsed("RSVP_SYNC_TIMEOUT_MS", 8_000),
                probe_interval_secs: parsed("RSVP_PROBE_INTERVAL_SECS", 30).max(1),
            },
            chat: ChatConfig {
                recipient: lookup("RSVP_CHAT_RECIPIENT").unwrap_or(defaults.recipient),
                deep_link_base: lookup("RSVP_DEEP_LINK_BASE").unwrap_or(defaults.base),
                recipient_param: lookup("RSVP_DEEP_LINK_RECIPIENT_PARAM")
                    .unwrap_or(defaults.recipient_param),
                dispatch_timeout_ms: parsed("RSVP_DISPATCH_TIMEOUT_MS", 3_000),
            },
            page: PageConfig {
                storage_dir: lookup("RSVP_STORAGE_DIR")
                    .map_or_else(|| PathBuf::from(".rsvp"), PathBuf::from),
                confirmation_delay_ms: parsed("RSVP_CONFIRMATION_DELAY_MS", 2_000),
                max_selections: lookup("RSVP_MAX_SELECTIONS")
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .map_or(MAX_SELECTIONS, |max| max.clamp(1, MAX_SELECTIONS)),
                catalog: lookup("RSVP_CATALOG").filter(|value| !value.trim().is_empty()),
            },
        }
    }

    /// Wait window for counter service calls
    #[must_use]
    pub const fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.service.timeout_ms)
    }

    /// Time between connectivity probes
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.service.probe_interval_secs)
    }

    /// Wait window for the chat hand-off
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.chat.dispatch_timeout_ms)
    }

    /// Confirmation display time
    #[must_use]
    pub const fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.page.confirmation_delay_ms)
    }

    /// Deep-link target for the chat
    #[must_use]
    pub fn deep_link_target(&self) -> DeepLinkTarget {
        DeepLinkTarget {
            base: self.chat.deep_link_base.clone(),
            recipient_param: self.chat.recipient_param.clone(),
            recipient: self.chat.recipient.clone(),
        }
    }

    /// Path of the durable store file
    #[must_use]
    pub fn local_store_path(&self) -> PathBuf {
        self.page.storage_dir.join("local.json")
    }

    /// Catalog from the override, or the default beverages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the override does not parse.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        self.page
            .catalog
            .as_deref()
            .map_or_else(|| Ok(Catalog::default_beverages()), Catalog::parse)
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
