//! SQLite backed `CacheStore`

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use concepto_core::errors::ExError;
use concepto_core::CacheStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Cache store keeping records in the `cache_items` table
pub struct SqliteCacheStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore").finish_non_exhaustive()
    }
}

impl SqliteCacheStore {
    /// Open (or create) a database file and bring its schema up to date
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the file cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn)
    }

    /// # Errors
    ///
    /// Returns a persistence error if migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Wrap an existing connection, applying pending migrations
    ///
    /// # Errors
    ///
    /// Returns a persistence error if migrations fail.
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Last write time of a record, as a unix timestamp
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT updated_at FROM cache_items WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, ExError> {
        self.conn
            .query_row("SELECT value FROM cache_items WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(from_rusqlite)
    }

    fn set_item(&mut self, key: &str, value: &str) -> std::result::Result<(), ExError> {
        let now = chrono::Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO cache_items (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(from_rusqlite)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> std::result::Result<(), ExError> {
        self.conn
            .execute("DELETE FROM cache_items WHERE key = ?", [key])
            .map_err(from_rusqlite)?;
        Ok(())
    }

    fn clear(&mut self) -> std::result::Result<(), ExError> {
        let removed = self
            .conn
            .execute("DELETE FROM cache_items", [])
            .map_err(from_rusqlite)?;
        tracing::debug!(removed, "sqlite cache cleared");
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, ExError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM cache_items ORDER BY key")
            .map_err(from_rusqlite)?;
        let keys = stmt
            .query_map([], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(from_rusqlite)?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_one_row() {
        let mut store = SqliteCacheStore::open_in_memory().unwrap();
        store.set_item("k", "1").unwrap();
        store.set_item("k", "2").unwrap();

        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
        assert!(store.updated_at("k").unwrap().is_some());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let mut store = SqliteCacheStore::open_in_memory().unwrap();
        store.remove_item("absent").unwrap();
        assert_eq!(store.get_item("absent").unwrap(), None);
    }
}
