//! Key/value storage behind the pipeline.
//!
//! Two scopes exist: a durable store that survives restarts ([`FileStore`])
//! and a session store for data handed from one page to the next
//! ([`MemoryStore`]). Both store strings; structured values are JSON.

use crate::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Storage keys shared with the rest of the site
pub mod keys {
    /// Sync-pending counter ledger (durable, JSON object)
    pub const PENDING_COUNTS: &str = "pendingCounts";
    /// Notification-pending counter ledger (durable, JSON object)
    pub const PENDING_NOTIFICATIONS: &str = "pendingWhatsAppCounts";
    /// Chat messages not yet handed off (durable, JSON array)
    pub const UNDELIVERED_MESSAGES: &str = "pendingWhatsAppMessages";
    /// Queue of reservations awaiting sync (durable, JSON array)
    pub const PENDING_RESERVATIONS: &str = "pendingReservations";
    /// Last baseline received from the counter service (durable)
    pub const COUNTS_SNAPSHOT: &str = "countsSnapshot";
    /// Last guest name entered on this device (durable, plain string)
    pub const INVITE_NAME: &str = "inviteName";
    /// Current submission, read back by the invitation page (session)
    pub const RESERVATION_DATA: &str = "reservationData";
    /// Guestbook entries (durable, JSON array)
    pub const GUESTBOOK: &str = "livreDorMessages";
}

/// String key/value store.
///
/// Operations are synchronous and complete before returning, so a reducer can
/// write through without suspending mid-mutation.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Reads a value
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the value cannot be stored.
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Deletes a value; missing keys are not an error
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be updated.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads and decodes a JSON value.
///
/// Missing keys, unreadable stores and undecodable values all yield `None`;
/// the latter two are logged. Corrupt values are left in place and simply
/// overwritten by the next save.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(error) => {
            tracing::warn!(key, %error, "storage read failed, using default");
            return None;
        },
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, %error, "discarding corrupt stored value");
            None
        },
    }
}

/// Encodes and writes a JSON value.
///
/// # Errors
///
/// Returns [`StorageError`] if encoding or the write fails.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw)
}

/// In-memory store, used for the session scope and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set`/`remove` calls so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later write fail with an I/O error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Durable store persisted as one JSON object file.
///
/// The whole file is rewritten on every change, through a temporary file and a
/// rename so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// A file that is not a JSON object of strings is treated as empty and
    /// replaced on the next write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the parent directory cannot be created
    /// or the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), %error, "storage file corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened durable store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        let previous = entries.insert(key.to_string(), value);
        if let Err(error) = self.flush(&entries) {
            // keep memory and disk in agreement
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(error);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(error) = self.flush(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(error);
        }
        Ok(())
    }
}
