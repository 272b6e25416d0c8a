//! Sharding of record files
//!
//! Keys are hashed and spread over subdirectories named by the first 2 hex
//! characters of the digest.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const RECORD_EXTENSION: &str = "json";

/// SHA-256 hex digest of a cache key
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// For digest "abc123...", returns "<root>/ab/abc123.json"
pub fn shard_path(root: &Path, digest: &str) -> PathBuf {
    let shard = &digest[..2.min(digest.len())];
    root.join(shard).join(format!("{}.{}", digest, RECORD_EXTENSION))
}

/// Whether a directory name looks like a shard directory
pub fn is_shard_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}
