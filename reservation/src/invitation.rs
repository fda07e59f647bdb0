//! Read-back of the reservation on the invitation page.

use crate::storage::{KeyValueStore, keys, load_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session record written when a submission passes validation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Guest name
    pub nom: String,
    /// Selected beverages
    #[serde(default)]
    pub boissons: Vec<String>,
    /// Submit time
    pub date: DateTime<Utc>,
}

/// What the invitation page shows about its guest
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvitationContext {
    /// Guest name, if one is known on this device
    pub guest_name: Option<String>,
    /// Beverages chosen in this session
    pub beverages: Vec<String>,
    /// When the reservation was made in this session
    pub reserved_at: Option<DateTime<Utc>>,
}

impl InvitationContext {
    /// Prefers this session's record and falls back to the last name stored
    /// on the device.
    #[must_use]
    pub fn load(session: &dyn KeyValueStore, local: &dyn KeyValueStore) -> Self {
        if let Some(record) = load_json::<SessionRecord>(session, keys::RESERVATION_DATA) {
            return Self {
                guest_name: Some(record.nom),
                beverages: record.boissons,
                reserved_at: Some(record.date),
            };
        }

        let guest_name = match local.get(keys::INVITE_NAME) {
            Ok(name) => name.filter(|name| !name.trim().is_empty()),
            Err(error) => {
                tracing::warn!(%error, "could not read stored guest name");
                None
            },
        };
        Self {
            guest_name,
            ..Self::default()
        }
    }

    /// Salutation at the top of the invitation
    #[must_use]
    pub fn greeting(&self) -> String {
        match &self.guest_name {
            Some(name) => format!("Cher(e) {name}, vous êtes invité(e) au mariage de Blessing & Tevin"),
            None => "Vous êtes invité(e) au mariage de Blessing & Tevin".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::storage::{MemoryStore, save_json};

    #[test]
    fn session_record_wins() {
        let session = MemoryStore::new();
        let local = MemoryStore::new();
        local.set(keys::INVITE_NAME, "Old name".into()).unwrap();
        save_json(
            &session,
            keys::RESERVATION_DATA,
            &SessionRecord {
                nom: "Jo".into(),
                boissons: vec!["Coca".into()],
                date: Utc::now(),
            },
        )
        .unwrap();

        let context = InvitationContext::load(&session, &local);
        assert_eq!(context.guest_name.as_deref(), Some("Jo"));
        assert_eq!(context.beverages, ["Coca"]);
        assert!(context.greeting().contains("Jo"));
    }

    #[test]
    fn falls_back_to_stored_name() {
        let session = MemoryStore::new();
        let local = MemoryStore::new();
        local.set(keys::INVITE_NAME, "Amani".into()).unwrap();

        let context = InvitationContext::load(&session, &local);
        assert_eq!(context.guest_name.as_deref(), Some("Amani"));
        assert!(context.reserved_at.is_none());
    }

    #[test]
    fn anonymous_greeting_without_any_record() {
        let context = InvitationContext::load(&MemoryStore::new(), &MemoryStore::new());
        assert_eq!(context, InvitationContext::default());
        assert!(context.greeting().starts_with("Vous êtes invité(e)"));
    }

    #[test]
    fn reads_records_written_by_the_older_page() {
        let session = MemoryStore::new();
        session
            .set(
                keys::RESERVATION_DATA,
                r#"{"nom":"Jo","date":"2025-06-14T15:00:00Z","timestamp":1749913200000}"#.into(),
            )
            .unwrap();

        let context = InvitationContext::load(&session, &MemoryStore::new());
        assert_eq!(context.guest_name.as_deref(), Some("Jo"));
        assert!(context.beverages.is_empty());
    }
}
