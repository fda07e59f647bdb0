//! Durable FIFO of reservations waiting for the counter service.

use crate::storage::{KeyValueStore, keys, load_json, save_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A submission the counter service has not acknowledged yet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReservation {
    /// Name as entered (trimmed)
    pub guest_name: String,
    /// Selected item names
    pub selections: Vec<String>,
    /// When the guest submitted
    pub submitted_at: DateTime<Utc>,
    /// Local identifier, stable across restarts
    pub local_id: Uuid,
}

/// Queue persisted as a JSON array under `pendingReservations`.
///
/// Every mutation rewrites the stored array before returning. If the write
/// fails the in-memory queue still holds the item and the next successful
/// write carries it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationQueue {
    items: VecDeque<PendingReservation>,
}

impl ReservationQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the stored queue. Corrupt data yields an empty queue.
    #[must_use]
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        let items: VecDeque<PendingReservation> =
            load_json(storage, keys::PENDING_RESERVATIONS).unwrap_or_default();
        tracing::debug!(queued = items.len(), "reservation queue loaded");
        Self { items }
    }

    /// Appends at the back
    pub fn push(&mut self, reservation: PendingReservation, storage: &dyn KeyValueStore) {
        tracing::info!(
            local_id = %reservation.local_id,
            guest = %reservation.guest_name,
            queued = self.items.len() + 1,
            "reservation queued for later sync"
        );
        self.items.push_back(reservation);
        self.persist(storage);
    }

    /// Removes the entry with `local_id`, wherever it sits
    pub fn remove(&mut self, local_id: Uuid, storage: &dyn KeyValueStore) -> Option<PendingReservation> {
        let index = self.items.iter().position(|item| item.local_id == local_id)?;
        let removed = self.items.remove(index);
        self.persist(storage);
        removed
    }

    /// Oldest entry
    #[must_use]
    pub fn front(&self) -> Option<&PendingReservation> {
        self.items.front()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingReservation> {
        self.items.iter()
    }

    /// Number of queued entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn persist(&self, storage: &dyn KeyValueStore) {
        if let Err(error) = save_json(storage, keys::PENDING_RESERVATIONS, &self.items) {
            tracing::error!(%error, queued = self.items.len(), "failed to persist reservation queue");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::storage::MemoryStore;

    fn reservation(name: &str) -> PendingReservation {
        PendingReservation {
            guest_name: name.to_string(),
            selections: vec!["Coca".to_string()],
            submitted_at: DateTime::parse_from_rfc3339("2025-06-14T15:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            local_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn keeps_fifo_order_across_reload() {
        let storage = MemoryStore::new();
        let mut queue = ReservationQueue::new();
        queue.push(reservation("Amani"), &storage);
        queue.push(reservation("Jo"), &storage);

        let reloaded = ReservationQueue::load(&storage);
        let names: Vec<_> = reloaded.iter().map(|r| r.guest_name.as_str()).collect();
        assert_eq!(names, ["Amani", "Jo"]);
    }

    #[test]
    fn removes_by_local_id() {
        let storage = MemoryStore::new();
        let mut queue = ReservationQueue::new();
        let first = reservation("Amani");
        let second = reservation("Jo");
        queue.push(first.clone(), &storage);
        queue.push(second.clone(), &storage);

        assert_eq!(queue.remove(second.local_id, &storage), Some(second));
        assert_eq!(queue.remove(Uuid::new_v4(), &storage), None);
        assert_eq!(ReservationQueue::load(&storage).front(), Some(&first));
    }

    #[test]
    fn stored_format_uses_camel_case() {
        let storage = MemoryStore::new();
        let mut queue = ReservationQueue::new();
        queue.push(reservation("Jo"), &storage);

        let raw = storage.get(keys::PENDING_RESERVATIONS).unwrap().unwrap();
        assert!(raw.contains("\"guestName\":\"Jo\""));
        assert!(raw.contains("\"localId\""));
    }

    #[test]
    fn corrupt_queue_loads_empty() {
        let storage = MemoryStore::new();
        storage.set(keys::PENDING_RESERVATIONS, "{\"oops\":1}".into()).unwrap();
        assert!(ReservationQueue::load(&storage).is_empty());
    }
}
