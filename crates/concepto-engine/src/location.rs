//! Where an engine run keeps its cache

use concepto_core::{CacheStore, MemoryCacheStore};
use concepto_store::errors::Result;
use concepto_store::{FsCacheStore, SqliteCacheStore};
use std::path::PathBuf;

/// Backing store selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process-local; nothing survives the run
    Memory,
    /// Sharded record files under a directory
    Directory(PathBuf),
    /// A SQLite database file
    Sqlite(PathBuf),
}

impl StoreLocation {
    /// Open the store, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an `ExError` if a SQLite database cannot be opened or migrated.
    pub fn open(&self) -> Result<Box<dyn CacheStore>> {
        let store: Box<dyn CacheStore> = match self {
            StoreLocation::Memory => Box::new(MemoryCacheStore::new()),
            StoreLocation::Directory(root) => Box::new(FsCacheStore::new(root.clone())),
            StoreLocation::Sqlite(path) => Box::new(SqliteCacheStore::open(path)?),
        };
        tracing::debug!(location = ?self, "cache store opened");
        Ok(store)
    }
}
