//! Error types for the reservation pipeline.
//!
//! None of these are fatal to a page. Validation and selection errors are
//! shown to the guest, the rest degrade to the queued/offline path and are
//! logged.

use thiserror::Error;

/// A submission that failed validation.
///
/// Variants are checked in declaration order and only the first failing rule
/// is reported. The display text is what the guest sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Trimmed guest name has fewer than `min` characters
    #[error("Veuillez entrer votre nom complet (minimum {min} caractères)")]
    NameTooShort {
        /// Minimum number of characters
        min: usize,
    },

    /// No beverage selected
    #[error("Veuillez sélectionner au moins une boisson")]
    EmptySelection,

    /// More beverages than allowed
    #[error("Vous ne pouvez sélectionner que {max} boissons maximum")]
    TooManySelections {
        /// Allowed maximum
        max: usize,
    },
}

/// A toggle that was refused. Selection is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// Selecting one more item would exceed the cap
    #[error("Vous ne pouvez sélectionner que {max} boissons maximum")]
    LimitExceeded {
        /// Allowed maximum
        max: usize,
    },

    /// Item is not part of the catalog
    #[error("Boisson inconnue : {0}")]
    UnknownItem(String),
}

/// Failures talking to the remote counter service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The request never produced an HTTP response
    #[error("Counter service unreachable: {0}")]
    Unreachable(String),

    /// No answer within the wait window
    #[error("Counter service did not answer within {after_ms}ms")]
    Timeout {
        /// Length of the elapsed window
        after_ms: u64,
    },

    /// Non-success HTTP status
    #[error("Counter service rejected the request with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// Service answered `success: false`
    #[error("Counter service error: {0}")]
    Service(String),

    /// Body could not be decoded or lacked counts
    #[error("Malformed counter service response: {0}")]
    MalformedResponse(String),
}

impl SyncError {
    /// Whether this failure means the service could not be reached at all.
    ///
    /// These flip the page offline; the others mean the service is up but
    /// refused or garbled this particular call.
    #[must_use]
    pub const fn is_connectivity_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}

/// Key/value storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying file could not be read or written
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Value could not be encoded
    #[error("Storage serialization error: {0}")]
    Serialization(String),

    /// Store lock poisoned by a panicking writer
    #[error("Storage unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A catalog entry did not follow `name:category`
    #[error("Invalid catalog entry '{0}' (expected name:alcoholic or name:soft)")]
    InvalidCatalogEntry(String),

    /// Catalog had no entries
    #[error("Catalog is empty")]
    EmptyCatalog,

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Guestbook posting and forwarding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuestbookError {
    /// Name missing
    #[error("Veuillez entrer votre nom")]
    MissingName,

    /// Message missing
    #[error("Veuillez écrire un message")]
    MissingMessage,

    /// Name shorter than `min` characters
    #[error("Le nom doit contenir au moins {min} caractères")]
    NameTooShort {
        /// Minimum number of characters
        min: usize,
    },

    /// Message shorter than `min` characters
    #[error("Le message doit contenir au moins {min} caractères")]
    MessageTooShort {
        /// Minimum number of characters
        min: usize,
    },

    /// Entry could not be stored
    #[error(transparent)]
    Storage(#[from] StorageError),
}
