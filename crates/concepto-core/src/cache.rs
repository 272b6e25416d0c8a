//! Incremental cache layer
//!
//! Compiled top-level bundles are cached by node content hash in a
//! [`CacheStore`]. Between runs the layer compares command fingerprints and
//! watched external values with the previous run and purges exactly the
//! bundles whose command trail touches something that changed.

pub mod fingerprint;
pub mod incremental;
pub mod store;

pub use fingerprint::{command_fingerprint, library_fingerprint, RegistryFingerprint};
pub use incremental::{
    BundleCache, CachedBundle, DirectoryEntry, IncrementalCache, Invalidation, Manifest,
    NoWatchSource, WatchSource, DIRECTORY_KEY, MANIFEST_KEY, NODE_KEY_PREFIX,
};
pub use store::{CacheStore, MemoryCacheStore};
