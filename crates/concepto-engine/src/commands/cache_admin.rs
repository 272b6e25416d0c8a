//! Cache inspection and maintenance.

use std::collections::{BTreeMap, BTreeSet};

use concepto_core::cache::{
    CachedBundle, DirectoryEntry, Manifest, DIRECTORY_KEY, MANIFEST_KEY, NODE_KEY_PREFIX,
};
use concepto_core::errors::{ExError, ExErrorKind};
use concepto_core::CacheStore;
use concepto_store::errors::Result;
use serde::Serialize;

/// Summary of what a cache store holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Every record, including the manifest and directory
    pub records: usize,
    /// Bundles reachable from the directory
    pub bundles: usize,
    /// Node records not listed in the directory
    pub orphans: usize,
    /// Library fingerprint from the stored manifest
    pub library: Option<String>,
    pub commands: BTreeSet<String>,
}

fn read_record<T: serde::de::DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get_item(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw).map(Some).map_err(|e| {
        ExError::new(ExErrorKind::CacheCorrupt)
            .with_op("read_cache_record")
            .with_message(format!("{}: {}", key, e))
    })
}

fn read_directory(store: &dyn CacheStore) -> Result<BTreeMap<String, DirectoryEntry>> {
    Ok(read_record(store, DIRECTORY_KEY)?.unwrap_or_default())
}

/// Count records and describe the stored manifest
///
/// # Errors
///
/// Returns an `ExError` if the store fails or the manifest or directory
/// record cannot be decoded.
pub fn cache_stats(store: &dyn CacheStore) -> Result<CacheStats> {
    let keys = store.keys()?;
    let directory = read_directory(store)?;
    let manifest: Option<Manifest> = read_record(store, MANIFEST_KEY)?;

    let listed: BTreeSet<&str> = directory.values().map(|e| e.cache_key.as_str()).collect();
    let orphans = keys
        .iter()
        .filter(|k| k.starts_with(NODE_KEY_PREFIX) && !listed.contains(k.as_str()))
        .count();

    Ok(CacheStats {
        records: keys.len(),
        bundles: directory.len(),
        orphans,
        library: manifest.as_ref().map(|m| m.library.clone()),
        commands: manifest
            .map(|m| m.commands.into_keys().collect())
            .unwrap_or_default(),
    })
}

/// The cached bundle for a bundle identity, if any
///
/// # Errors
///
/// Returns an `ExError` if the store fails or a record cannot be decoded.
pub fn show_bundle(store: &dyn CacheStore, identity: &str) -> Result<Option<CachedBundle>> {
    let directory = read_directory(store)?;
    match directory.get(identity) {
        Some(entry) => read_record(store, &entry.cache_key),
        None => Ok(None),
    }
}
