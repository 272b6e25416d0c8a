//! File-system cache store
//!
//! Provides:
//! - One JSON record file per key, named by the SHA-256 digest of the key
//! - Atomic writes (temp → rename)
//! - Sharding by first 2 hex chars of the digest

mod atomic;
mod fs_store;
mod sharding;

pub use fs_store::FsCacheStore;
