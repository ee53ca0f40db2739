//! Durable local store: transactional primary backend with a flat
//! key-value fallback, behaviorally indistinguishable to callers.

mod failover;
mod kv;
mod sqlite;

pub use failover::FailoverStore;
pub use kv::JsonKvStore;
pub use sqlite::SqliteStore;

use crate::error::{Error, Result};

/// Key-addressed durable table storage.
///
/// All operations are scoped transactions: they either fully commit or have
/// no effect. Implementations must survive process restarts and must never
/// touch the network.
pub trait LocalStore: Send + Sync {
    /// Insert or replace the row `id` in `table`
    fn put(&self, table: &str, id: &str, body: &serde_json::Value) -> Result<()>;

    /// Fetch the row `id` from `table`, if present
    fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>>;

    /// Remove the row `id` from `table`; removing a missing row is a no-op
    fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// All rows of `table`, unordered
    fn list(&self, table: &str) -> Result<Vec<serde_json::Value>>;
}

/// Table names are interpolated into SQL and used as fallback namespaces,
/// so they are restricted to a conservative identifier charset.
pub(crate) fn check_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("invalid table name: {table}")))
    }
}
