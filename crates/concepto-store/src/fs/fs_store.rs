//! File-system backed `CacheStore`

use crate::errors::{cache_corrupt, from_serde, io_error, key_collision, Result};
use crate::fs::atomic::atomic_write;
use crate::fs::sharding::{is_shard_name, key_digest, shard_path, RECORD_EXTENSION};
use concepto_core::errors::ExError;
use concepto_core::CacheStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// On-disk record; the key is kept so listings and collision checks work
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
}

/// Cache store writing one JSON record per key under a root directory
///
/// Files other than shard directories under the root are left alone, so
/// the root may be shared with other tooling.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at the given directory (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_record(&self, path: &Path) -> Result<Option<Record>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("fs_read", e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| cache_corrupt(&path.display().to_string(), &e.to_string()))
    }

    fn shard_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("fs_list", e)),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("fs_list", e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| io_error("fs_list", e))?
                .is_dir();
            let name = entry.file_name();
            if is_dir && name.to_str().is_some_and(is_shard_name) {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

impl CacheStore for FsCacheStore {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, ExError> {
        let digest = key_digest(key);
        let path = shard_path(&self.root, &digest);
        match self.read_record(&path)? {
            Some(record) if record.key == key => Ok(Some(record.value)),
            Some(record) => Err(key_collision(&digest, &record.key, key)),
            None => Ok(None),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> std::result::Result<(), ExError> {
        let digest = key_digest(key);
        let path = shard_path(&self.root, &digest);

        // An unreadable record is overwritten; a foreign key is not
        if let Ok(Some(existing)) = self.read_record(&path) {
            if existing.key != key {
                return Err(key_collision(&digest, &existing.key, key));
            }
        }

        let record = Record {
            key: key.to_string(),
            value: value.to_string(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| from_serde("fs_write", e))?;
        atomic_write(&path, &bytes)?;
        tracing::trace!(key, path = %path.display(), "cache record written");
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> std::result::Result<(), ExError> {
        let path = shard_path(&self.root, &key_digest(key));
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("fs_remove", e)),
        }
    }

    fn clear(&mut self) -> std::result::Result<(), ExError> {
        let dirs = self.shard_dirs()?;
        let removed = dirs.len();
        for dir in dirs {
            fs::remove_dir_all(&dir).map_err(|e| io_error("fs_clear", e))?;
        }
        tracing::debug!(root = %self.root.display(), shards = removed, "cache directory cleared");
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, ExError> {
        let mut keys = Vec::new();
        for dir in self.shard_dirs()? {
            let entries = fs::read_dir(&dir).map_err(|e| io_error("fs_list", e))?;
            for entry in entries {
                let path = entry.map_err(|e| io_error("fs_list", e))?.path();
                if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                    if let Some(record) = self.read_record(&path)? {
                        keys.push(record.key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
