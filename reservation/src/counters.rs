//! Per-item reservation counters.
//!
//! A displayed count is the sum of two parts: the baseline last confirmed by
//! the counter service and the local selections not yet confirmed. The local
//! part lives in a [`PendingLedger`] that is written through to durable
//! storage on every change, so counts shown after a restart still include
//! reservations the service has not seen.

use crate::catalog::Catalog;
use crate::storage::{KeyValueStore, load_json, save_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remote count for one item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    /// Confirmed reservations
    pub count: u32,
    /// When the service last changed this count
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Item name → remote count, as returned by the counter service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountSnapshot(BTreeMap<String, ItemCount>);

impl CountSnapshot {
    /// Empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the count for one item
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, count: u32) -> Self {
        self.0.insert(
            name.into(),
            ItemCount {
                count,
                last_updated: None,
            },
        );
        self
    }

    /// Count for `name`, 0 when absent
    #[must_use]
    pub fn count(&self, name: &str) -> u32 {
        self.0.get(name).map_or(0, |item| item.count)
    }

    /// Full entry for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ItemCount> {
        self.0.get(name)
    }

    /// Inserts or replaces an entry
    pub fn insert(&mut self, name: impl Into<String>, item: ItemCount) {
        self.0.insert(name.into(), item);
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemCount)> {
        self.0.iter()
    }

    /// Whether the snapshot has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u32)> for CountSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, count)| {
                    (
                        name,
                        ItemCount {
                            count,
                            last_updated: None,
                        },
                    )
                })
                .collect(),
        )
    }
}

/// Durable name → count map of unconfirmed selections.
///
/// Counts are unsigned and settle with a floor of zero; zero entries are
/// dropped. Every change rewrites the whole map under the ledger's key.
/// A failed write is logged and the in-memory value kept, since the ledger is
/// a best-effort mirror of reservations that are themselves durably queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLedger {
    key: &'static str,
    counts: BTreeMap<String, u32>,
}

impl PendingLedger {
    /// Empty ledger persisted under `key`
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            counts: BTreeMap::new(),
        }
    }

    /// Replaces the in-memory counts with what `storage` holds.
    ///
    /// A missing or corrupt value leaves the ledger empty.
    pub fn load(&mut self, storage: &dyn KeyValueStore) {
        self.counts = load_json::<BTreeMap<String, u32>>(storage, self.key).unwrap_or_default();
        self.counts.retain(|_, count| *count > 0);
        tracing::debug!(key = self.key, items = self.counts.len(), "pending ledger loaded");
    }

    /// Adds one per name, then persists
    pub fn add(&mut self, names: &[String], storage: &dyn KeyValueStore) {
        for name in names {
            let count = self.counts.entry(name.clone()).or_insert(0);
            *count = count.saturating_add(1);
        }
        self.persist(storage);
    }

    /// Removes one per name (never below zero), then persists
    pub fn settle(&mut self, names: &[String], storage: &dyn KeyValueStore) {
        for name in names {
            if let Some(count) = self.counts.get_mut(name) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.counts.remove(name);
                }
            }
        }
        self.persist(storage);
    }

    /// Pending count for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Sum over all items
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.values().fold(0, |acc, count| acc.saturating_add(*count))
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Storage key
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Non-zero entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    fn persist(&self, storage: &dyn KeyValueStore) {
        if let Err(error) = save_json(storage, self.key, &self.counts) {
            tracing::warn!(key = self.key, %error, "failed to persist pending ledger");
        }
    }
}

/// Counter view for one item
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterEntry {
    /// Last count confirmed by the service
    pub server_count: u32,
    /// Local selections not yet confirmed
    pub pending_count: u32,
    /// When the service last updated the count
    pub last_updated: Option<DateTime<Utc>>,
}

impl CounterEntry {
    /// What the page shows
    #[must_use]
    pub const fn display_count(&self) -> u32 {
        self.server_count.saturating_add(self.pending_count)
    }
}

/// Baseline plus sync-pending counts for every catalog item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterStore {
    names: Vec<String>,
    baseline: BTreeMap<String, ItemCount>,
    pending: PendingLedger,
}

impl CounterStore {
    /// Zeroed counters for the catalog, with a ledger under `pending_key`
    #[must_use]
    pub fn new(catalog: &Catalog, pending_key: &'static str) -> Self {
        Self {
            names: catalog.names().map(str::to_string).collect(),
            baseline: BTreeMap::new(),
            pending: PendingLedger::new(pending_key),
        }
    }

    /// Resets every catalog item's baseline from `snapshot`.
    ///
    /// Items absent from the snapshot go back to zero. Pending counts are not
    /// touched. Loading the same snapshot twice is a no-op.
    pub fn load_baseline(&mut self, snapshot: &CountSnapshot) {
        self.baseline = self
            .names
            .iter()
            .map(|name| (name.clone(), snapshot.get(name).cloned().unwrap_or_default()))
            .collect();

        let unknown = snapshot
            .iter()
            .filter(|(name, _)| !self.baseline.contains_key(name.as_str()))
            .count();
        if unknown > 0 {
            tracing::debug!(unknown, "snapshot lists items outside the catalog");
        }
    }

    /// Restores pending counts from durable storage
    pub fn load_pending(&mut self, storage: &dyn KeyValueStore) {
        self.pending.load(storage);
    }

    /// Optimistically counts `names` as reserved
    pub fn add_pending(&mut self, names: &[String], storage: &dyn KeyValueStore) {
        self.pending.add(names, storage);
    }

    /// Marks `names` as confirmed by the service
    pub fn settle_pending(&mut self, names: &[String], storage: &dyn KeyValueStore) {
        self.pending.settle(names, storage);
    }

    /// Baseline count
    #[must_use]
    pub fn server_count(&self, name: &str) -> u32 {
        self.baseline.get(name).map_or(0, |item| item.count)
    }

    /// Unconfirmed local count
    #[must_use]
    pub fn pending_count(&self, name: &str) -> u32 {
        self.pending.get(name)
    }

    /// `server_count + pending_count`
    #[must_use]
    pub fn display_count(&self, name: &str) -> u32 {
        self.entry(name).display_count()
    }

    /// Both parts for one item
    #[must_use]
    pub fn entry(&self, name: &str) -> CounterEntry {
        let baseline = self.baseline.get(name);
        CounterEntry {
            server_count: baseline.map_or(0, |item| item.count),
            pending_count: self.pending.get(name),
            last_updated: baseline.and_then(|item| item.last_updated),
        }
    }

    /// Display counts for every catalog item
    #[must_use]
    pub fn display_counts(&self) -> BTreeMap<String, u32> {
        self.names
            .iter()
            .map(|name| (name.clone(), self.display_count(name)))
            .collect()
    }

    /// The sync-pending ledger
    #[must_use]
    pub const fn pending(&self) -> &PendingLedger {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::storage::{MemoryStore, keys};
    use proptest::prelude::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_string()).collect()
    }

    fn counters() -> CounterStore {
        CounterStore::new(&Catalog::default_beverages(), keys::PENDING_COUNTS)
    }

    #[test]
    fn display_is_baseline_plus_pending() {
        let storage = MemoryStore::new();
        let mut counters = counters();
        counters.load_baseline(&CountSnapshot::new().with("Coca", 4));
        counters.add_pending(&names(&["Coca", "Eau"]), &storage);

        assert_eq!(counters.display_count("Coca"), 5);
        assert_eq!(counters.display_count("Eau"), 1);
        assert_eq!(counters.display_count("Fanta"), 0);
    }

    #[test]
    fn baseline_resets_missing_items() {
        let mut counters = counters();
        counters.load_baseline(&CountSnapshot::new().with("Coca", 4).with("Fanta", 1));
        counters.load_baseline(&CountSnapshot::new().with("Fanta", 2));

        assert_eq!(counters.server_count("Coca"), 0);
        assert_eq!(counters.server_count("Fanta"), 2);
    }

    #[test]
    fn pending_survives_reload() {
        let storage = MemoryStore::new();
        let mut counters = counters();
        counters.add_pending(&names(&["Champagne", "Champagne"]), &storage);

        let mut reloaded = self::counters();
        reloaded.load_pending(&storage);
        assert_eq!(reloaded.pending_count("Champagne"), 2);
    }

    #[test]
    fn corrupt_pending_map_loads_empty() {
        let storage = MemoryStore::new();
        storage.set(keys::PENDING_COUNTS, "[\"Coca\"]".into()).unwrap();

        let mut counters = counters();
        counters.load_pending(&storage);
        assert!(counters.pending().is_empty());
    }

    #[test]
    fn write_failure_keeps_memory_value() {
        let storage = MemoryStore::new();
        storage.set_failing(true);

        let mut counters = counters();
        counters.add_pending(&names(&["Coca"]), &storage);
        assert_eq!(counters.pending_count("Coca"), 1);
    }

    #[test]
    fn over_settlement_floors_at_zero() {
        let storage = MemoryStore::new();
        let mut ledger = PendingLedger::new(keys::PENDING_NOTIFICATIONS);
        ledger.add(&names(&["Coca"]), &storage);
        ledger.settle(&names(&["Coca", "Coca", "Fanta"]), &storage);

        assert_eq!(ledger.get("Coca"), 0);
        assert_eq!(ledger.get("Fanta"), 0);
        assert!(ledger.is_empty());
        assert_eq!(storage.get(keys::PENDING_NOTIFICATIONS).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn snapshot_reads_service_wire_format() {
        let snapshot: CountSnapshot = serde_json::from_str(
            r#"{"Coca": {"count": 3, "lastUpdated": "2025-06-14T15:00:00Z"}, "Eau": {"count": 1}}"#,
        )
        .unwrap();
        assert_eq!(snapshot.count("Coca"), 3);
        assert_eq!(snapshot.count("Eau"), 1);
        assert!(snapshot.get("Coca").unwrap().last_updated.is_some());
    }

    #[derive(Clone, Debug)]
    enum LedgerOp {
        Add(Vec<usize>),
        Settle(Vec<usize>),
    }

    fn ledger_op() -> impl Strategy<Value = LedgerOp> {
        let picks = proptest::collection::vec(0usize..3, 0..3);
        prop_oneof![
            picks.clone().prop_map(LedgerOp::Add),
            picks.prop_map(LedgerOp::Settle),
        ]
    }

    const ITEMS: [&str; 3] = ["Coca", "Champagne", "Eau"];

    fn picked(indices: &[usize]) -> Vec<String> {
        indices.iter().map(|i| ITEMS[*i].to_string()).collect()
    }

    proptest! {
        #[test]
        fn display_count_is_always_the_sum(
            baseline in proptest::collection::vec(0u32..50, 3),
            ops in proptest::collection::vec(ledger_op(), 0..30),
        ) {
            let storage = MemoryStore::new();
            let mut counters = counters();
            let snapshot: CountSnapshot = ITEMS
                .iter()
                .zip(&baseline)
                .map(|(name, count)| ((*name).to_string(), *count))
                .collect();
            counters.load_baseline(&snapshot);

            let mut model = [0i64; 3];
            for op in ops {
                match op {
                    LedgerOp::Add(indices) => {
                        counters.add_pending(&picked(&indices), &storage);
                        for i in indices {
                            model[i] += 1;
                        }
                    },
                    LedgerOp::Settle(indices) => {
                        counters.settle_pending(&picked(&indices), &storage);
                        for i in indices {
                            model[i] = (model[i] - 1).max(0);
                        }
                    },
                }

                for (i, name) in ITEMS.iter().enumerate() {
                    let pending = counters.pending_count(name);
                    prop_assert_eq!(i64::from(pending), model[i]);
                    prop_assert_eq!(
                        counters.display_count(name),
                        counters.server_count(name) + pending
                    );
                }
            }
        }

        #[test]
        fn add_then_settle_restores_previous_counts(
            prior in proptest::collection::vec(0usize..2, 0..6),
            a in 0usize..3,
            b in 0usize..3,
        ) {
            let storage = MemoryStore::new();
            let mut counters = counters();
            counters.add_pending(&picked(&prior), &storage);
            let before: Vec<u32> = ITEMS.iter().map(|name| counters.pending_count(name)).collect();

            counters.add_pending(&picked(&[a, b]), &storage);
            counters.settle_pending(&picked(&[a, b]), &storage);

            let after: Vec<u32> = ITEMS.iter().map(|name| counters.pending_count(name)).collect();
            prop_assert_eq!(before, after);
        }
    }
}
