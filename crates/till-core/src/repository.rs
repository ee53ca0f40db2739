//! Generic per-type record repository: local CRUD plus queue bookkeeping

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{now_ms, RecordId, Syncable};
use crate::queue::{PendingQueue, QueueEntry};
use crate::store::LocalStore;

/// Create/read/update/delete against the durable local store, enqueueing a
/// pending mutation on every write.
///
/// Reads never block on the network. Domain types differ only in their
/// validation and remote row mapping; every repository instance shares this
/// machinery.
pub struct RecordRepository<T: Syncable> {
    store: Arc<dyn LocalStore>,
    queue: Arc<PendingQueue>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Syncable> RecordRepository<T> {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, queue: Arc<PendingQueue>) -> Self {
        Self {
            store,
            queue,
            _record: PhantomData,
        }
    }

    /// Validate and persist a freshly created record, queueing its upsert
    pub fn create(&self, mut record: T) -> Result<T> {
        record.validate()?;

        let id = record.id().as_str();
        if self.store.get(T::RECORD_TYPE, &id)?.is_some() {
            return Err(Error::Validation(format!("record already exists: {id}")));
        }

        record.set_synced_at(None);
        let body = serde_json::to_value(&record)?;
        self.store.put(T::RECORD_TYPE, &id, &body)?;
        self.queue
            .enqueue(T::RECORD_TYPE, QueueEntry::upsert(id, body))?;
        Ok(record)
    }

    /// Fetch a record by id from the local store
    pub fn get(&self, id: RecordId) -> Result<Option<T>> {
        match self.store.get(T::RECORD_TYPE, &id.as_str())? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Merge a patch onto an existing record, re-validate, and re-queue.
    ///
    /// The re-queued upsert replaces any prior pending entry for the id.
    pub fn update(&self, id: RecordId, patch: T::Patch) -> Result<T> {
        let mut record = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        record.apply_patch(patch);
        record.validate()?;
        record.touch(now_ms());
        record.set_synced_at(None);

        let body = serde_json::to_value(&record)?;
        self.store.put(T::RECORD_TYPE, &id.as_str(), &body)?;
        self.queue
            .enqueue(T::RECORD_TYPE, QueueEntry::upsert(id.as_str(), body))?;
        Ok(record)
    }

    /// Remove the local record and queue its remote delete.
    ///
    /// The queued delete supersedes any pending upsert, so a record created
    /// and deleted while offline never reaches the remote at all.
    pub fn delete(&self, id: RecordId) -> Result<()> {
        if self.store.get(T::RECORD_TYPE, &id.as_str())?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        self.store.delete(T::RECORD_TYPE, &id.as_str())?;
        self.queue
            .enqueue(T::RECORD_TYPE, QueueEntry::delete(id.as_str()))?;
        Ok(())
    }

    /// All local records, most recently updated first
    pub fn list(&self) -> Result<Vec<T>> {
        let mut records: Vec<T> = self
            .store
            .list(T::RECORD_TYPE)?
            .into_iter()
            .filter_map(|body| match serde_json::from_value(body) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(
                        record_type = T::RECORD_TYPE,
                        "skipping unreadable local row: {e}"
                    );
                    None
                }
            })
            .collect();
        records.sort_by_key(|record| std::cmp::Reverse(record.updated_at()));
        Ok(records)
    }

    /// Local records matching a caller-supplied filter
    pub fn list_filtered(&self, filter: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        Ok(self.list()?.into_iter().filter(|r| filter(r)).collect())
    }

    /// Cached size of this type's pending queue
    pub fn pending_count(&self) -> Result<usize> {
        self.queue.count(T::RECORD_TYPE)
    }

    /// Queued entries for this type in drain order
    pub fn pending_entries(&self) -> Result<Vec<QueueEntry>> {
        self.queue.entries(T::RECORD_TYPE)
    }
}
