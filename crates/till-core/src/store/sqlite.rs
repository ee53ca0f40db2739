//! Primary store backend on an embedded `SQLite` database

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::{check_table_name, LocalStore};
use crate::error::{Error, Result};

/// Transactional embedded store, one `SQLite` table per record type
pub struct SqliteStore {
    conn: Mutex<Connection>,
    known_tables: Mutex<HashSet<String>>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            known_tables: Mutex::new(HashSet::new()),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("store connection mutex poisoned".to_string()))
    }

    /// Create the backing table on first use of a record type
    fn ensure_table(&self, conn: &Connection, table: &str) -> Result<()> {
        check_table_name(table)?;
        let mut known = self
            .known_tables
            .lock()
            .map_err(|_| Error::Storage("table cache mutex poisoned".to_string()))?;
        if known.contains(table) {
            return Ok(());
        }
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                )"
            ),
            [],
        )?;
        known.insert(table.to_string());
        Ok(())
    }
}

/// Configure `SQLite` for durable single-process use
fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

impl LocalStore for SqliteStore {
    fn put(&self, table: &str, id: &str, body: &serde_json::Value) -> Result<()> {
        let mut conn = self.conn()?;
        self.ensure_table(&conn, table)?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {table} (id, body) VALUES (?, ?)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body"
            ),
            params![id, body],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn()?;
        self.ensure_table(&conn, table)?;
        let result = conn.query_row(
            &format!("SELECT body FROM {table} WHERE id = ?"),
            params![id],
            |row| row.get::<_, serde_json::Value>(0),
        );
        match result {
            Ok(body) => Ok(Some(body)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        self.ensure_table(&conn, table)?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {table} WHERE id = ?"), params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn list(&self, table: &str) -> Result<Vec<serde_json::Value>> {
        let conn = self.conn()?;
        self.ensure_table(&conn, table)?;
        let mut stmt = conn.prepare(&format!("SELECT body FROM {table}"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, serde_json::Value>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
