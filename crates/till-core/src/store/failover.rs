//! Primary/fallback routing so no operation is lost when the embedded
//! database is unusable

use std::path::Path;

use super::{JsonKvStore, LocalStore, SqliteStore};
use crate::error::Result;

/// Durable store facade over the primary backend and the key-value fallback.
///
/// Writes are attempted against the primary and, on any error, transparently
/// repeated against the fallback; reads prefer the primary but fall back on
/// error. Callers never observe which backend served them; an error is
/// surfaced only when both backends fail.
pub struct FailoverStore {
    primary: Option<SqliteStore>,
    fallback: JsonKvStore,
}

impl FailoverStore {
    /// Open both backends; a primary that fails to open degrades the store
    /// to fallback-only instead of failing the caller.
    pub fn open(db_path: impl AsRef<Path>, kv_path: impl AsRef<Path>) -> Result<Self> {
        let primary = match SqliteStore::open(db_path) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("primary store unavailable, using key-value fallback: {e}");
                None
            }
        };
        Ok(Self {
            primary,
            fallback: JsonKvStore::open(kv_path)?,
        })
    }

    /// In-memory pairing (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            primary: Some(SqliteStore::open_in_memory()?),
            fallback: JsonKvStore::in_memory(),
        })
    }

    /// Store with no primary backend at all
    #[must_use]
    pub fn fallback_only(fallback: JsonKvStore) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Whether the primary backend is in use
    #[must_use]
    pub const fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

impl LocalStore for FailoverStore {
    fn put(&self, table: &str, id: &str, body: &serde_json::Value) -> Result<()> {
        if let Some(primary) = &self.primary {
            match primary.put(table, id, body) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("primary put failed, repeating on fallback: {e}"),
            }
        }
        self.fallback.put(table, id, body)
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>> {
        if let Some(primary) = &self.primary {
            match primary.get(table, id) {
                Ok(found) => return Ok(found),
                Err(e) => tracing::warn!("primary get failed, reading fallback: {e}"),
            }
        }
        self.fallback.get(table, id)
    }

    fn delete(&self, table: &str, id: &str) -> Result<()> {
        if let Some(primary) = &self.primary {
            match primary.delete(table, id) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("primary delete failed, repeating on fallback: {e}"),
            }
        }
        self.fallback.delete(table, id)
    }

    fn list(&self, table: &str) -> Result<Vec<serde_json::Value>> {
        if let Some(primary) = &self.primary {
            match primary.list(table) {
                Ok(rows) => return Ok(rows),
                Err(e) => tracing::warn!("primary list failed, reading fallback: {e}"),
            }
        }
        self.fallback.list(table)
    }
}
