//! Engine-owned state: the durable store, the pending queues, and the
//! change notifier, wired together at startup

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Syncable;
use crate::notify::ChangeNotifier;
use crate::queue::PendingQueue;
use crate::repository::RecordRepository;
use crate::store::{FailoverStore, LocalStore};
use crate::sync::{ConnectivitySignal, RemoteAuthority, SessionProvider, SyncConfig, SyncEngine};

/// Explicit owner of all shared mutable engine state.
///
/// Repositories and the sync engine are handed references to this state
/// instead of reaching for globals; nothing else writes to the store or
/// queues directly.
pub struct Hub {
    store: Arc<dyn LocalStore>,
    queue: Arc<PendingQueue>,
    notifier: ChangeNotifier,
}

impl Hub {
    /// Open the durable store (primary database plus fallback file)
    pub fn open(db_path: impl AsRef<Path>, kv_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_store(FailoverStore::open(db_path, kv_path)?))
    }

    /// Fully in-memory hub (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_store(FailoverStore::open_in_memory()?))
    }

    fn from_store(store: FailoverStore) -> Self {
        let store: Arc<dyn LocalStore> = Arc::new(store);
        let notifier = ChangeNotifier::new();
        let queue = Arc::new(PendingQueue::new(store.clone(), notifier.clone()));
        Self {
            store,
            queue,
            notifier,
        }
    }

    /// Typed repository over this hub's store and queue
    #[must_use]
    pub fn repository<T: Syncable>(&self) -> RecordRepository<T> {
        RecordRepository::new(self.store.clone(), self.queue.clone())
    }

    /// Sync engine over this hub's store and queue
    #[must_use]
    pub fn sync_engine(
        &self,
        remote: Arc<dyn RemoteAuthority>,
        connectivity: Arc<dyn ConnectivitySignal>,
        sessions: Arc<dyn SessionProvider>,
        config: SyncConfig,
    ) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            self.queue.clone(),
            remote,
            connectivity,
            sessions,
            config,
        )
    }

    /// The process-wide change notifier
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Cached pending-queue size for one record type
    pub fn pending_count<T: Syncable>(&self) -> Result<usize> {
        self.queue.count(T::RECORD_TYPE)
    }
}
