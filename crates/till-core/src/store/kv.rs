//! Flat key-value fallback backend persisted as a single JSON file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{check_table_name, LocalStore};
use crate::error::{Error, Result};

type Tables = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Fallback store for environments where the embedded database is unusable.
///
/// Data lives under a namespaced key per table, serialized as a mapping from
/// id to record body. Every write rewrites the file through a temp-file
/// rename, so a crash mid-write leaves the previous snapshot intact.
pub struct JsonKvStore {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl JsonKvStore {
    /// Open (or create) the backing file at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Tables::new()
        };
        Ok(Self {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// Volatile store with no backing file (useful for testing)
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: Mutex::new(Tables::new()),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Storage("kv store mutex poisoned".to_string()))
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(tables)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl LocalStore for JsonKvStore {
    fn put(&self, table: &str, id: &str, body: &serde_json::Value) -> Result<()> {
        check_table_name(table)?;
        let mut tables = self.tables()?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), body.clone());
        self.persist(&tables)
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>> {
        check_table_name(table)?;
        let tables = self.tables()?;
        Ok(tables.get(table).and_then(|rows| rows.get(id)).cloned())
    }

    fn delete(&self, table: &str, id: &str) -> Result<()> {
        check_table_name(table)?;
        let mut tables = self.tables()?;
        if let Some(rows) = tables.get_mut(table) {
            rows.remove(id);
        }
        self.persist(&tables)
    }

    fn list(&self, table: &str) -> Result<Vec<serde_json::Value>> {
        check_table_name(table)?;
        let tables = self.tables()?;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
