//! Pending-mutation queues, one per record type

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::now_ms;
use crate::notify::ChangeNotifier;
use crate::store::LocalStore;

/// Operation awaiting confirmation from the Remote Authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOp {
    /// Push the embedded local record state (only the latest state matters)
    Upsert(serde_json::Value),
    /// Remove the record remotely
    Delete,
}

/// One queued not-yet-confirmed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Record id this mutation belongs to
    pub id: String,
    pub op: PendingOp,
    /// Insertion timestamp (Unix ms); drain order is ascending, ties by id
    pub enqueued_at: i64,
    /// Why the last drain attempt failed, if it did
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Entry pushing the given local record state
    #[must_use]
    pub fn upsert(id: impl Into<String>, record: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            op: PendingOp::Upsert(record),
            enqueued_at: now_ms(),
            last_error: None,
        }
    }

    /// Entry deleting the record remotely
    #[must_use]
    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            op: PendingOp::Delete,
            enqueued_at: now_ms(),
            last_error: None,
        }
    }
}

/// Durable queues of not-yet-confirmed mutations, keyed by record id.
///
/// At most one entry exists per id per queue: a new mutation replaces the
/// prior entry, and a queued `Delete` supersedes any `Upsert` for the same
/// id. Sizes are tracked in a cached counter so UI badges never trigger a
/// full scan.
pub struct PendingQueue {
    store: Arc<dyn LocalStore>,
    notifier: ChangeNotifier,
    counts: Mutex<HashMap<String, usize>>,
}

impl PendingQueue {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            notifier,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn table(record_type: &str) -> String {
        format!("queue_{record_type}")
    }

    fn counts(&self) -> Result<MutexGuard<'_, HashMap<String, usize>>> {
        self.counts
            .lock()
            .map_err(|_| Error::Storage("queue counter mutex poisoned".to_string()))
    }

    /// Insert or replace the entry for `entry.id`; fires the change
    /// notifier exactly once on success.
    pub fn enqueue(&self, record_type: &str, entry: QueueEntry) -> Result<()> {
        let table = Self::table(record_type);
        let existing = self.entry_in(&table, &entry.id)?;

        // A queued Delete is final; a later Upsert for the same id cannot
        // resurrect the record before the Delete is confirmed.
        if matches!(existing.as_ref().map(|e| &e.op), Some(PendingOp::Delete))
            && matches!(entry.op, PendingOp::Upsert(_))
        {
            tracing::warn!(
                record_type,
                id = %entry.id,
                "dropping upsert queued behind a pending delete"
            );
            return Ok(());
        }

        // Seed the counter from pre-write state so the scan never sees
        // the entry being written.
        drop(self.seeded_counts(&table)?);

        self.store
            .put(&table, &entry.id, &serde_json::to_value(&entry)?)?;

        let mut counts = self.counts()?;
        if existing.is_none() {
            *counts.entry(table).or_insert(0) += 1;
        }
        drop(counts);

        self.notifier.notify();
        Ok(())
    }

    /// Remove the entry for `id`, if queued; fires the change notifier
    /// exactly once when an entry was actually removed.
    pub fn remove(&self, record_type: &str, id: &str) -> Result<()> {
        let table = Self::table(record_type);
        if self.entry_in(&table, id)?.is_none() {
            return Ok(());
        }

        drop(self.seeded_counts(&table)?);

        self.store.delete(&table, id)?;

        let mut counts = self.counts()?;
        if let Some(count) = counts.get_mut(&table) {
            *count = count.saturating_sub(1);
        }
        drop(counts);

        self.notifier.notify();
        Ok(())
    }

    /// The queued entry for `id`, if any
    pub fn entry(&self, record_type: &str, id: &str) -> Result<Option<QueueEntry>> {
        self.entry_in(&Self::table(record_type), id)
    }

    /// Whether `id` has a pending mutation
    pub fn has_pending(&self, record_type: &str, id: &str) -> Result<bool> {
        Ok(self.entry(record_type, id)?.is_some())
    }

    /// All queued entries in drain order: ascending `enqueued_at`, ties
    /// broken by id for determinism.
    pub fn entries(&self, record_type: &str) -> Result<Vec<QueueEntry>> {
        let table = Self::table(record_type);
        let mut entries: Vec<QueueEntry> = self
            .store
            .list(&table)?
            .into_iter()
            .filter_map(|body| match serde_json::from_value(body) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(record_type, "skipping unreadable queue entry: {e}");
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| (a.enqueued_at, &a.id).cmp(&(b.enqueued_at, &b.id)));
        Ok(entries)
    }

    /// Entries whose last drain attempt failed
    pub fn entries_with_errors(&self, record_type: &str) -> Result<Vec<QueueEntry>> {
        Ok(self
            .entries(record_type)?
            .into_iter()
            .filter(|entry| entry.last_error.is_some())
            .collect())
    }

    /// Queue size from the cached counter; never a full scan once seeded
    pub fn count(&self, record_type: &str) -> Result<usize> {
        let table = Self::table(record_type);
        let counts = self.seeded_counts(&table)?;
        Ok(counts.get(&table).copied().unwrap_or(0))
    }

    /// Record why draining `id` failed, keeping the entry queued
    pub fn set_last_error(&self, record_type: &str, id: &str, error: impl Into<String>) -> Result<()> {
        let table = Self::table(record_type);
        if let Some(mut entry) = self.entry_in(&table, id)? {
            entry.last_error = Some(error.into());
            self.store.put(&table, id, &serde_json::to_value(&entry)?)?;
        }
        Ok(())
    }

    /// Stamp every queued entry with the same error (e.g. "auth required")
    pub fn mark_all(&self, record_type: &str, error: &str) -> Result<()> {
        for entry in self.entries(record_type)? {
            self.set_last_error(record_type, &entry.id, error)?;
        }
        Ok(())
    }

    fn entry_in(&self, table: &str, id: &str) -> Result<Option<QueueEntry>> {
        match self.store.get(table, id)? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Counter map with the given table seeded from a one-time scan
    fn seeded_counts(&self, table: &str) -> Result<MutexGuard<'_, HashMap<String, usize>>> {
        let mut counts = self.counts()?;
        if !counts.contains_key(table) {
            let size = self.store.list(table)?.len();
            counts.insert(table.to_string(), size);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FailoverStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> (PendingQueue, ChangeNotifier) {
        let store = Arc::new(FailoverStore::open_in_memory().unwrap());
        let notifier = ChangeNotifier::new();
        (PendingQueue::new(store, notifier.clone()), notifier)
    }

    #[test]
    fn test_enqueue_coalesces_by_id() {
        let (queue, _) = setup();

        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({ "amount_cents": 5000 })))
            .unwrap();
        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({ "amount_cents": 7500 })))
            .unwrap();

        let entries = queue.entries("bookings").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].op,
            PendingOp::Upsert(json!({ "amount_cents": 7500 }))
        );
        assert_eq!(queue.count("bookings").unwrap(), 1);
    }

    #[test]
    fn test_delete_supersedes_upsert() {
        let (queue, _) = setup();

        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({})))
            .unwrap();
        queue.enqueue("bookings", QueueEntry::delete("a")).unwrap();

        let entries = queue.entries("bookings").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op, PendingOp::Delete);
    }

    #[test]
    fn test_upsert_never_replaces_pending_delete() {
        let (queue, _) = setup();

        queue.enqueue("bookings", QueueEntry::delete("a")).unwrap();
        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({})))
            .unwrap();

        let entries = queue.entries("bookings").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op, PendingOp::Delete);
    }

    #[test]
    fn test_notifier_fires_once_per_change() {
        let (queue, notifier) = setup();
        let mut rx = notifier.subscribe();

        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({})))
            .unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        queue.remove("bookings", "a").unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // Removing an absent entry changes nothing and stays silent.
        queue.remove("bookings", "a").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drain_order_is_deterministic() {
        let (queue, _) = setup();

        let mut first = QueueEntry::upsert("b", json!({}));
        first.enqueued_at = 100;
        let mut second = QueueEntry::upsert("a", json!({}));
        second.enqueued_at = 100;
        let mut third = QueueEntry::upsert("c", json!({}));
        third.enqueued_at = 50;

        queue.enqueue("bookings", first).unwrap();
        queue.enqueue("bookings", second).unwrap();
        queue.enqueue("bookings", third).unwrap();

        let ids: Vec<String> = queue
            .entries("bookings")
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_count_survives_new_queue_instance() {
        let store = Arc::new(FailoverStore::open_in_memory().unwrap());
        let queue = PendingQueue::new(store.clone(), ChangeNotifier::new());
        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({})))
            .unwrap();
        queue
            .enqueue("bookings", QueueEntry::upsert("b", json!({})))
            .unwrap();

        // A fresh instance over the same store seeds its counter by scanning once.
        let reopened = PendingQueue::new(store, ChangeNotifier::new());
        assert_eq!(reopened.count("bookings").unwrap(), 2);
    }

    #[test]
    fn test_last_error_bookkeeping() {
        let (queue, _) = setup();
        queue
            .enqueue("bookings", QueueEntry::upsert("a", json!({})))
            .unwrap();
        queue
            .enqueue("bookings", QueueEntry::upsert("b", json!({})))
            .unwrap();

        queue.set_last_error("bookings", "a", "sync failed").unwrap();
        let failing = queue.entries_with_errors("bookings").unwrap();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].id, "a");

        queue.mark_all("bookings", "authentication required").unwrap();
        assert_eq!(queue.entries_with_errors("bookings").unwrap().len(), 2);
    }
}
