//! The guestbook: messages left on this device, optionally forwarded to the
//! couple's chat.

use crate::error::GuestbookError;
use crate::notification::{DeepLinkOpener, NotificationDispatch, WEDDING_TITLE};
use crate::storage::{KeyValueStore, keys, load_json, save_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Minimum name length for forwarding
pub const MIN_FORWARD_NAME_CHARS: usize = 2;

/// Minimum message length for forwarding
pub const MIN_FORWARD_MESSAGE_CHARS: usize = 5;

/// One guestbook message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookEntry {
    /// Author
    pub nom: String,
    /// Text
    pub message: String,
    /// When it was written
    pub date: DateTime<Utc>,
}

/// Guestbook stored as a JSON array under `livreDorMessages`
#[derive(Debug, Clone)]
pub struct Guestbook {
    storage: Arc<dyn KeyValueStore>,
}

impl Guestbook {
    /// Guestbook kept in `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Entries, newest first. A corrupt list reads as empty.
    #[must_use]
    pub fn entries(&self) -> Vec<GuestbookEntry> {
        let mut entries: Vec<GuestbookEntry> =
            load_json(self.storage.as_ref(), keys::GUESTBOOK).unwrap_or_default();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// [`GuestbookError::MissingName`] or [`GuestbookError::MissingMessage`]
    /// for blank fields, [`GuestbookError::Storage`] if the list cannot be
    /// saved.
    pub fn post(
        &self,
        nom: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<GuestbookEntry, GuestbookError> {
        let (nom, message) = (nom.trim(), message.trim());
        if nom.is_empty() {
            return Err(GuestbookError::MissingName);
        }
        if message.is_empty() {
            return Err(GuestbookError::MissingMessage);
        }

        let entry = GuestbookEntry {
            nom: nom.to_string(),
            message: message.to_string(),
            date: at,
        };
        let mut entries: Vec<GuestbookEntry> =
            load_json(self.storage.as_ref(), keys::GUESTBOOK).unwrap_or_default();
        entries.push(entry.clone());
        save_json(self.storage.as_ref(), keys::GUESTBOOK, &entries)?;

        tracing::info!(author = %entry.nom, total = entries.len(), "guestbook entry saved");
        Ok(entry)
    }
}

/// Checks a message against the forwarding rules.
///
/// # Errors
///
/// Blank name, blank message, short name, short message, in that order.
pub fn validate_forward(nom: &str, message: &str) -> Result<(), GuestbookError> {
    let (nom, message) = (nom.trim(), message.trim());
    if nom.is_empty() {
        return Err(GuestbookError::MissingName);
    }
    if message.is_empty() {
        return Err(GuestbookError::MissingMessage);
    }
    if nom.chars().count() < MIN_FORWARD_NAME_CHARS {
        return Err(GuestbookError::NameTooShort {
            min: MIN_FORWARD_NAME_CHARS,
        });
    }
    if message.chars().count() < MIN_FORWARD_MESSAGE_CHARS {
        return Err(GuestbookError::MessageTooShort {
            min: MIN_FORWARD_MESSAGE_CHARS,
        });
    }
    Ok(())
}

/// Chat text for a forwarded guestbook message
#[must_use]
pub fn format_guestbook_message(nom: &str, message: &str, at: DateTime<Utc>) -> String {
    format!(
        "🎉 *NOUVEAU MESSAGE DU LIVRE D'OR* 🎉\n\n\
         👤 *Nom*: {}\n\n\
         💌 *Message*:\n{}\n\n\
         📅 *Date*: {}\n\n\
         💍 *{WEDDING_TITLE}*",
        nom.trim(),
        message.trim(),
        at.format("%d/%m/%Y %H:%M"),
    )
}

/// Validates and hands a guestbook message to the chat.
///
/// Returns whether the hand-off was accepted; `false` means the link was
/// blocked and the guest should try again.
///
/// # Errors
///
/// Any [`validate_forward`] failure; nothing is dispatched then.
pub async fn forward<O: DeepLinkOpener>(
    dispatch: &NotificationDispatch<O>,
    nom: &str,
    message: &str,
    at: DateTime<Utc>,
) -> Result<bool, GuestbookError> {
    validate_forward(nom, message)?;
    let handed_off = dispatch
        .dispatch(&format_guestbook_message(nom, message, at))
        .await;
    if !handed_off {
        tracing::warn!(author = %nom.trim(), "guestbook forward blocked");
    }
    Ok(handed_off)
}
