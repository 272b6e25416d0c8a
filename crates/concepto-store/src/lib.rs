//! Concepto Store - durable cache stores for incremental compilation
//!
//! Provides:
//! - Sharded file-system key-value store with atomic writes
//! - SQLite key-value store with an embedded migrations framework
//!
//! Both implement `concepto_core::CacheStore`, so either can back an
//! `IncrementalCache`.

pub mod db;
pub mod errors;
pub mod fs;
pub mod migrations;
pub mod sqlite;

// Re-export key types
pub use errors::Result;
pub use fs::FsCacheStore;
pub use sqlite::SqliteCacheStore;
