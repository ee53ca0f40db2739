//! Sync engine: drains pending-mutation queues against the Remote
//! Authority and pulls recent remote changes back into the local store.

mod http;

pub use http::HttpRemoteAuthority;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::{now_ms, Syncable};
use crate::queue::{PendingOp, PendingQueue, QueueEntry};
use crate::store::LocalStore;

/// Errors from the Remote Authority
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote runs an older/newer row shape and rejected a field name
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with an application-level error
    #[error("remote API error: {0}")]
    Api(String),
}

/// Errors from the session provider
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no usable session")]
    NoSession,

    #[error("session expired at {0}")]
    Expired(i64),
}

/// Row shape to use when querying the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Canonical,
    Legacy,
}

/// The single server-side system holding the canonical copy of all records.
///
/// Upsert and delete must be idempotent: the engine retries with
/// at-least-once semantics and relies on repeats being safe.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Idempotent upsert-by-id; returns the stored (possibly
    /// server-enriched) row
    async fn upsert(
        &self,
        record_type: &str,
        row: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, RemoteError>;

    /// Idempotent delete-by-id
    async fn delete(&self, record_type: &str, id: &str) -> std::result::Result<(), RemoteError>;

    /// Rows modified at or after `since` (Unix ms)
    async fn list_modified_since(
        &self,
        record_type: &str,
        since: i64,
        shape: RowShape,
    ) -> std::result::Result<Vec<serde_json::Value>, RemoteError>;
}

/// Reports whether the network is reachable, and when it becomes so
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;

    /// Watch reachability transitions; used to trigger opportunistic syncs
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Resolves a usable authenticated session before any push/pull
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn ensure_session(&self) -> std::result::Result<(), AuthError>;
}

/// Connectivity signal toggled by the host (or by tests)
pub struct StaticConnectivity {
    tx: watch::Sender<bool>,
}

impl StaticConnectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }
}

impl ConnectivitySignal for StaticConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Session provider backed by a pre-acquired bearer token
pub struct StaticSession {
    token: Mutex<Option<String>>,
}

impl StaticSession {
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    #[must_use]
    pub fn none() -> Self {
        Self {
            token: Mutex::new(None),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = token;
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn ensure_session(&self) -> std::result::Result<(), AuthError> {
        let usable = self
            .token
            .lock()
            .map(|token| token.as_deref().is_some_and(|t| !t.trim().is_empty()))
            .unwrap_or(false);
        if usable {
            Ok(())
        } else {
            Err(AuthError::NoSession)
        }
    }
}

/// Tuning knobs for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on any single remote call
    pub remote_timeout: Duration,
    /// How far back the best-effort pull looks for remote changes
    pub pull_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(30),
            pull_window: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_pull_window(mut self, window: Duration) -> Self {
        self.pull_window = window;
        self
    }
}

/// Why a sync pass could not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedReason {
    /// No usable authenticated session; user action required
    AuthRequired,
}

/// Outcome of one `sync()` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Queue entries confirmed and removed
    pub succeeded: usize,
    /// Queue entries left queued with `last_error` updated
    pub failed: usize,
    pub blocked_reason: Option<BlockedReason>,
}

/// Drains pending-mutation queues (push) and refreshes local rows from the
/// remote (pull), one record type at a time.
///
/// All collaborators are injected so tests run without a real network.
/// Transient failures stay queued for the next pass; only a confirmed
/// success ever removes an entry.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    queue: Arc<PendingQueue>,
    remote: Arc<dyn RemoteAuthority>,
    connectivity: Arc<dyn ConnectivitySignal>,
    sessions: Arc<dyn SessionProvider>,
    config: SyncConfig,
    in_flight: Mutex<HashSet<&'static str>>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn LocalStore>,
        queue: Arc<PendingQueue>,
        remote: Arc<dyn RemoteAuthority>,
        connectivity: Arc<dyn ConnectivitySignal>,
        sessions: Arc<dyn SessionProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            queue,
            remote,
            connectivity,
            sessions,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Push-then-pull one record type.
    ///
    /// Returns immediately with zero work done when offline or when a pass
    /// for the same type is already in flight. Sync errors are recorded on
    /// the queue entries and summarized in the result, never thrown.
    pub async fn sync<T: Syncable>(&self) -> SyncResult {
        if !self.connectivity.is_online() {
            tracing::debug!(record_type = T::RECORD_TYPE, "offline, skipping sync");
            return SyncResult::default();
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, T::RECORD_TYPE) else {
            tracing::debug!(record_type = T::RECORD_TYPE, "sync already in flight");
            return SyncResult::default();
        };

        if let Err(e) = self.sessions.ensure_session().await {
            tracing::warn!(record_type = T::RECORD_TYPE, "sync blocked: {e}");
            if let Err(err) = self.queue.mark_all(T::RECORD_TYPE, "authentication required") {
                tracing::warn!("failed to mark queue entries: {err}");
            }
            return SyncResult {
                blocked_reason: Some(BlockedReason::AuthRequired),
                ..SyncResult::default()
            };
        }

        let mut result = SyncResult::default();

        let entries = match self.queue.entries(T::RECORD_TYPE) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(record_type = T::RECORD_TYPE, "cannot read queue: {e}");
                return result;
            }
        };

        for entry in entries {
            match self.push_entry::<T>(&entry).await {
                Ok(()) => {
                    if let Err(e) = self.queue.remove(T::RECORD_TYPE, &entry.id) {
                        tracing::warn!(id = %entry.id, "confirmed entry not removed: {e}");
                    }
                    result.succeeded += 1;
                }
                // One failing item must not block the rest of the drain.
                Err(message) => {
                    tracing::debug!(id = %entry.id, "push failed: {message}");
                    if let Err(e) =
                        self.queue
                            .set_last_error(T::RECORD_TYPE, &entry.id, message.as_str())
                    {
                        tracing::warn!(id = %entry.id, "failed to record error: {e}");
                    }
                    result.failed += 1;
                }
            }
        }

        self.pull::<T>().await;

        tracing::debug!(
            record_type = T::RECORD_TYPE,
            succeeded = result.succeeded,
            failed = result.failed,
            "sync pass finished"
        );
        result
    }

    /// Drain whenever the connectivity signal reports the network back.
    ///
    /// Runs until the signal's sender goes away.
    pub async fn run_auto_sync<T: Syncable>(&self) {
        let mut rx = self.connectivity.subscribe();
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online {
                tracing::debug!(record_type = T::RECORD_TYPE, "connectivity restored");
                self.sync::<T>().await;
            }
        }
    }

    async fn push_entry<T: Syncable>(&self, entry: &QueueEntry) -> std::result::Result<(), String> {
        match &entry.op {
            PendingOp::Upsert(body) => {
                let record: T = serde_json::from_value(body.clone())
                    .map_err(|e| format!("unreadable queued record: {e}"))?;
                let confirmed = self.upsert_remote(&record).await?;
                self.confirm_upsert(record, &confirmed)
                    .map_err(|e| format!("confirmed write-back failed: {e}"))
            }
            PendingOp::Delete => {
                self.bounded(self.remote.delete(T::RECORD_TYPE, &entry.id))
                    .await
            }
        }
    }

    /// Upsert with the canonical row shape, retrying once with the legacy
    /// mapping when the remote rejects a field name.
    async fn upsert_remote<T: Syncable>(
        &self,
        record: &T,
    ) -> std::result::Result<serde_json::Value, String> {
        let canonical = self.remote.upsert(T::RECORD_TYPE, record.to_remote_row());
        match tokio::time::timeout(self.config.remote_timeout, canonical).await {
            Ok(Ok(row)) => Ok(row),
            Ok(Err(RemoteError::SchemaMismatch(msg))) => {
                tracing::debug!(
                    record_type = T::RECORD_TYPE,
                    "canonical row rejected ({msg}), retrying legacy shape"
                );
                let legacy = self.remote.upsert(T::RECORD_TYPE, record.to_legacy_row());
                self.bounded(legacy).await
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("timeout".to_string()),
        }
    }

    /// Write the server-confirmed record back with `synced_at` stamped
    fn confirm_upsert<T: Syncable>(&self, local: T, confirmed: &serde_json::Value) -> Result<()> {
        let mut record = T::from_remote_row(confirmed).unwrap_or(local);
        let server_ts = record.updated_at();
        record.set_synced_at(Some(if server_ts > 0 { server_ts } else { now_ms() }));
        self.store.put(
            T::RECORD_TYPE,
            &record.id().as_str(),
            &serde_json::to_value(&record)?,
        )
    }

    /// Best-effort pull of recently modified remote rows.
    ///
    /// Any id with a pending local mutation is skipped entirely; local
    /// pending edits win until they are pushed and confirmed. Failures are
    /// logged and retried on the next pass.
    async fn pull<T: Syncable>(&self) {
        #[allow(clippy::cast_possible_wrap)]
        let since = now_ms() - self.config.pull_window.as_millis() as i64;

        let canonical = self
            .remote
            .list_modified_since(T::RECORD_TYPE, since, RowShape::Canonical);
        let rows = match tokio::time::timeout(self.config.remote_timeout, canonical).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(RemoteError::SchemaMismatch(msg))) => {
                tracing::debug!(
                    record_type = T::RECORD_TYPE,
                    "canonical pull rejected ({msg}), retrying legacy shape"
                );
                let legacy = self
                    .remote
                    .list_modified_since(T::RECORD_TYPE, since, RowShape::Legacy);
                match self.bounded(legacy).await {
                    Ok(rows) => rows,
                    Err(message) => {
                        tracing::warn!(record_type = T::RECORD_TYPE, "pull failed: {message}");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(record_type = T::RECORD_TYPE, "pull failed: {e}");
                return;
            }
            Err(_) => {
                tracing::warn!(record_type = T::RECORD_TYPE, "pull timed out");
                return;
            }
        };

        for row in rows {
            if let Err(e) = self.apply_pulled_row::<T>(&row) {
                tracing::warn!(record_type = T::RECORD_TYPE, "skipping pulled row: {e}");
            }
        }
    }

    fn apply_pulled_row<T: Syncable>(&self, row: &serde_json::Value) -> Result<()> {
        let mut incoming = T::from_remote_row(row)?;
        let id = incoming.id().as_str();

        if self.queue.has_pending(T::RECORD_TYPE, &id)? {
            tracing::debug!(%id, "pull skipped: local mutation pending");
            return Ok(());
        }

        if let Some(local) = self.store.get(T::RECORD_TYPE, &id)? {
            let local: T = serde_json::from_value(local)?;
            // An unconfirmed local edit is never clobbered, and timestamps
            // from other devices are untrusted unless strictly newer.
            if local.synced_at().is_none() || incoming.updated_at() <= local.updated_at() {
                return Ok(());
            }
        }

        incoming.set_synced_at(Some(now_ms()));
        self.store
            .put(T::RECORD_TYPE, &id, &serde_json::to_value(&incoming)?)
    }

    /// Bound a remote call by the configured timeout, flattening the
    /// outcome into a queue-entry error message.
    async fn bounded<V>(
        &self,
        call: impl std::future::Future<Output = std::result::Result<V, RemoteError>>,
    ) -> std::result::Result<V, String> {
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("timeout".to_string()),
        }
    }
}

/// Marks a record type's sync pass as in flight for the guard's lifetime
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<&'static str>>,
    record_type: &'static str,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<&'static str>>, record_type: &'static str) -> Option<Self> {
        let mut guard = set.lock().ok()?;
        if !guard.insert(record_type) {
            return None;
        }
        Some(Self { set, record_type })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.set.lock() {
            guard.remove(self.record_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, BookingPatch, LedgerEntry, LedgerKind};
    use crate::notify::ChangeNotifier;
    use crate::repository::RecordRepository;
    use crate::store::FailoverStore;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory Remote Authority with failure and latency injection
    #[derive(Default)]
    struct MockRemote {
        rows: Mutex<HashMap<String, BTreeMap<String, serde_json::Value>>>,
        upserted_ids: Mutex<Vec<String>>,
        failing_ids: Mutex<HashSet<String>>,
        legacy_only: AtomicBool,
        delay: Mutex<Option<Duration>>,
    }

    impl MockRemote {
        fn fail_id(&self, id: &str) {
            self.failing_ids.lock().unwrap().insert(id.to_string());
        }

        fn clear_failures(&self) {
            self.failing_ids.lock().unwrap().clear();
        }

        fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        fn row(&self, record_type: &str, id: &str) -> Option<serde_json::Value> {
            self.rows
                .lock()
                .unwrap()
                .get(record_type)
                .and_then(|rows| rows.get(id))
                .cloned()
        }

        fn insert_row(&self, record_type: &str, id: &str, row: serde_json::Value) {
            self.rows
                .lock()
                .unwrap()
                .entry(record_type.to_string())
                .or_default()
                .insert(id.to_string(), row);
        }

        fn row_count(&self, record_type: &str) -> usize {
            self.rows
                .lock()
                .unwrap()
                .get(record_type)
                .map_or(0, BTreeMap::len)
        }

        fn upserted(&self) -> Vec<String> {
            self.upserted_ids.lock().unwrap().clone()
        }

        async fn maybe_delay(&self) {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        /// The legacy remote rejects canonical field names it never had
        fn rejects(&self, row: &serde_json::Value) -> bool {
            self.legacy_only.load(Ordering::SeqCst)
                && (row.get("customer").is_some() || row.get("description").is_some())
        }
    }

    #[async_trait]
    impl RemoteAuthority for MockRemote {
        async fn upsert(
            &self,
            record_type: &str,
            row: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, RemoteError> {
            self.maybe_delay().await;

            let id = row["id"].as_str().unwrap_or_default().to_string();
            if self.failing_ids.lock().unwrap().contains(&id) {
                return Err(RemoteError::Api("injected failure (500)".to_string()));
            }
            if self.rejects(&row) {
                return Err(RemoteError::SchemaMismatch(
                    "column \"customer\" does not exist".to_string(),
                ));
            }

            self.upserted_ids.lock().unwrap().push(id.clone());
            self.insert_row(record_type, &id, row.clone());
            Ok(row)
        }

        async fn delete(
            &self,
            record_type: &str,
            id: &str,
        ) -> std::result::Result<(), RemoteError> {
            self.maybe_delay().await;
            if self.failing_ids.lock().unwrap().contains(id) {
                return Err(RemoteError::Api("injected failure (500)".to_string()));
            }
            self.rows
                .lock()
                .unwrap()
                .entry(record_type.to_string())
                .or_default()
                .remove(id);
            Ok(())
        }

        async fn list_modified_since(
            &self,
            record_type: &str,
            since: i64,
            shape: RowShape,
        ) -> std::result::Result<Vec<serde_json::Value>, RemoteError> {
            self.maybe_delay().await;
            if self.legacy_only.load(Ordering::SeqCst) && shape == RowShape::Canonical {
                return Err(RemoteError::SchemaMismatch(
                    "column \"updated_at\" does not exist".to_string(),
                ));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(record_type)
                .map(|rows| {
                    rows.values()
                        .filter(|row| {
                            row.get("updated_at")
                                .and_then(serde_json::Value::as_i64)
                                .is_some_and(|at| at >= since)
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    struct Harness {
        repo: RecordRepository<Booking>,
        ledger: RecordRepository<LedgerEntry>,
        engine: Arc<SyncEngine>,
        remote: Arc<MockRemote>,
        connectivity: Arc<StaticConnectivity>,
        session: Arc<StaticSession>,
        queue: Arc<PendingQueue>,
        store: Arc<dyn LocalStore>,
    }

    fn harness(online: bool, with_session: bool) -> Harness {
        let store: Arc<dyn LocalStore> = Arc::new(FailoverStore::open_in_memory().unwrap());
        let queue = Arc::new(PendingQueue::new(store.clone(), ChangeNotifier::new()));
        let remote = Arc::new(MockRemote::default());
        let connectivity = Arc::new(StaticConnectivity::new(online));
        let session = Arc::new(if with_session {
            StaticSession::with_token("valid-token")
        } else {
            StaticSession::none()
        });

        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            queue.clone(),
            remote.clone(),
            connectivity.clone(),
            session.clone(),
            SyncConfig::default().with_remote_timeout(Duration::from_secs(2)),
        ));

        Harness {
            repo: RecordRepository::new(store.clone(), queue.clone()),
            ledger: RecordRepository::new(store.clone(), queue.clone()),
            engine,
            remote,
            connectivity,
            session,
            queue,
            store,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_sync_is_a_noop() {
        let h = harness(false, true);
        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let result = h.engine.sync::<Booking>().await;

        assert_eq!(result, SyncResult::default());
        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 1);
        assert!(h.remote.upserted().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_without_session_is_blocked() {
        let h = harness(true, false);
        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let result = h.engine.sync::<Booking>().await;

        assert_eq!(result.blocked_reason, Some(BlockedReason::AuthRequired));
        assert_eq!(result.succeeded, 0);
        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 1);

        let entries = h.queue.entries_with_errors(Booking::RECORD_TYPE).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_error.as_deref(), Some("authentication required"));

        // A session later makes the same queue drain cleanly; nothing was lost.
        h.session.set_token(Some("valid-token".to_string()));
        let retry = h.engine.sync::<Booking>().await;
        assert_eq!(retry.succeeded, 1);
        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_edits_coalesce_then_sync() {
        let h = harness(false, true);

        // Create at 5000 while offline, then edit to 7500 still offline.
        let booking = h
            .repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();
        h.repo
            .update(
                booking.id,
                BookingPatch {
                    amount_cents: Some(7500),
                    ..BookingPatch::default()
                },
            )
            .unwrap();

        let entries = h.queue.entries(Booking::RECORD_TYPE).unwrap();
        assert_eq!(entries.len(), 1);

        h.connectivity.set_online(true);
        let result = h.engine.sync::<Booking>().await;

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 0);

        let synced = h.repo.get(booking.id).unwrap().unwrap();
        assert!(synced.synced_at.is_some());
        assert_eq!(synced.amount_cents, 7500);

        let remote_row = h.remote.row(Booking::RECORD_TYPE, &booking.id.as_str()).unwrap();
        assert_eq!(remote_row["amount_cents"], 7500);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_is_idempotent() {
        let h = harness(true, true);
        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let first = h.engine.sync::<Booking>().await;
        let second = h.engine.sync::<Booking>().await;

        assert_eq!(first.succeeded, 1);
        assert_eq!(second, SyncResult::default());
        assert_eq!(h.remote.row_count(Booking::RECORD_TYPE), 1);
        assert_eq!(h.remote.upserted().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_create_delete_never_reaches_remote() {
        let h = harness(false, true);
        let entry = h
            .ledger
            .create(LedgerEntry::new("Paper rolls", "supplies", 899, LedgerKind::Expense))
            .unwrap();
        h.ledger.delete(entry.id).unwrap();

        h.connectivity.set_online(true);
        let result = h.engine.sync::<LedgerEntry>().await;

        assert_eq!(result.succeeded, 1);
        assert!(h.remote.upserted().is_empty());
        assert_eq!(h.remote.row_count(LedgerEntry::RECORD_TYPE), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_failing_item_does_not_block_others() {
        let h = harness(true, true);
        let failing = h
            .repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();
        let passing = h
            .repo
            .create(Booking::new("Grace", "Coloring", 9000, 1_700_000_000_000))
            .unwrap();
        h.remote.fail_id(&failing.id.as_str());

        let result = h.engine.sync::<Booking>().await;
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(h.repo.get(passing.id).unwrap().unwrap().synced_at.is_some());

        let errors = h.queue.entries_with_errors(Booking::RECORD_TYPE).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, failing.id.as_str());
        assert!(errors[0].last_error.as_deref().unwrap().contains("injected failure"));

        // The failed entry drains on the next pass once the remote recovers.
        h.remote.clear_failures();
        let retry = h.engine.sync::<Booking>().await;
        assert_eq!(retry.succeeded, 1);
        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_refreshes_unseen_records() {
        let h = harness(true, true);
        let remote_booking = Booking::new("Remote", "Haircut", 4000, 1_700_000_000_000);
        h.remote.insert_row(
            Booking::RECORD_TYPE,
            &remote_booking.id.as_str(),
            remote_booking.to_remote_row(),
        );

        h.engine.sync::<Booking>().await;

        let pulled = h.repo.get(remote_booking.id).unwrap().unwrap();
        assert_eq!(pulled.customer, "Remote");
        assert!(pulled.synced_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_never_clobbers_pending_local_edit() {
        let h = harness(true, true);
        let booking = h
            .repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        // The remote holds a diverging copy of the same id, newer by clock.
        let mut remote_row = booking.to_remote_row();
        remote_row["customer"] = serde_json::json!("Hijacked");
        remote_row["updated_at"] = serde_json::json!(now_ms() + 60_000);
        h.remote.fail_id(&booking.id.as_str()); // keep the entry pending
        h.remote
            .insert_row(Booking::RECORD_TYPE, &booking.id.as_str(), remote_row);

        h.engine.sync::<Booking>().await;

        let local = h.repo.get(booking.id).unwrap().unwrap();
        assert_eq!(local.customer, "Ada");
        assert!(local.synced_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_skips_unsynced_local_row_without_queue_entry() {
        let h = harness(true, true);

        // An unsynced row with no queue entry (e.g. a half-imported seed).
        let local = Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000);
        h.store
            .put(
                Booking::RECORD_TYPE,
                &local.id.as_str(),
                &serde_json::to_value(&local).unwrap(),
            )
            .unwrap();

        let mut remote_row = local.to_remote_row();
        remote_row["customer"] = serde_json::json!("Hijacked");
        remote_row["updated_at"] = serde_json::json!(now_ms() + 60_000);
        h.remote
            .insert_row(Booking::RECORD_TYPE, &local.id.as_str(), remote_row);

        h.engine.sync::<Booking>().await;

        let kept = h.repo.get(local.id).unwrap().unwrap();
        assert_eq!(kept.customer, "Ada");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_overwrites_older_synced_local_row() {
        let h = harness(true, true);
        let booking = h
            .repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();
        h.engine.sync::<Booking>().await; // confirm, queue empty

        let mut remote_row = booking.to_remote_row();
        remote_row["amount_cents"] = serde_json::json!(6000);
        remote_row["updated_at"] = serde_json::json!(now_ms() + 60_000);
        h.remote
            .insert_row(Booking::RECORD_TYPE, &booking.id.as_str(), remote_row);

        h.engine.sync::<Booking>().await;

        let refreshed = h.repo.get(booking.id).unwrap().unwrap();
        assert_eq!(refreshed.amount_cents, 6000);
        assert!(refreshed.synced_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_legacy_remote_shape_fallback() {
        let h = harness(true, true);
        h.remote.legacy_only.store(true, Ordering::SeqCst);

        let booking = h
            .repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let result = h.engine.sync::<Booking>().await;
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);

        // The remote stored the legacy shape; the local copy is confirmed.
        let remote_row = h.remote.row(Booking::RECORD_TYPE, &booking.id.as_str()).unwrap();
        assert_eq!(remote_row["customer_name"], "Ada");
        assert_eq!(remote_row["amount"], 50.0);
        assert!(h.repo.get(booking.id).unwrap().unwrap().synced_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_timeout_is_a_transient_failure() {
        let h = harness(true, true);
        let engine = Arc::new(SyncEngine::new(
            h.store.clone(),
            h.queue.clone(),
            h.remote.clone(),
            h.connectivity.clone(),
            h.session.clone(),
            SyncConfig::default().with_remote_timeout(Duration::from_millis(50)),
        ));
        h.remote.set_delay(Duration::from_millis(300));

        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let result = engine.sync::<Booking>().await;
        assert_eq!(result.failed, 1);

        let errors = h.queue.entries_with_errors(Booking::RECORD_TYPE).unwrap();
        assert_eq!(errors[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_at_most_one_sync_in_flight_per_type() {
        let h = harness(true, true);
        h.remote.set_delay(Duration::from_millis(300));
        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let engine = h.engine.clone();
        let first = tokio::spawn(async move { engine.sync::<Booking>().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Re-entrant call while the first pass is still draining: no-op.
        let second = h.engine.sync::<Booking>().await;
        assert_eq!(second, SyncResult::default());

        let first = first.await.unwrap();
        assert_eq!(first.succeeded, 1);
        assert_eq!(h.remote.upserted().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_auto_sync_drains_on_reconnect() {
        let h = harness(false, true);
        h.repo
            .create(Booking::new("Ada", "Haircut", 5000, 1_700_000_000_000))
            .unwrap();

        let engine = h.engine.clone();
        let auto = tokio::spawn(async move { engine.run_auto_sync::<Booking>().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.connectivity.set_online(true);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(h.queue.count(Booking::RECORD_TYPE).unwrap(), 0);
        assert_eq!(h.remote.row_count(Booking::RECORD_TYPE), 1);
        auto.abort();
    }
}
