use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::fingerprint::{watch_fingerprint, RegistryFingerprint};
use super::store::CacheStore;
use crate::compiler::Bundle;
use crate::errors::{ConceptoError, Result};
use crate::model::StateMap;
use crate::registry::CommandRegistry;

/// Store key of the previous run's fingerprints
pub const MANIFEST_KEY: &str = "concepto:manifest";
/// Store key of the bundle directory
pub const DIRECTORY_KEY: &str = "concepto:directory";
/// Prefix of per-node bundle records
pub const NODE_KEY_PREFIX: &str = "concepto:node:";

/// Source of watched external values
pub trait WatchSource {
    /// Current value of a watched key, `None` if unset
    fn observe(&self, key: &str) -> Option<String>;
}

/// Watch source for runs without external watched values
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWatchSource;

impl WatchSource for NoWatchSource {
    fn observe(&self, _key: &str) -> Option<String> {
        None
    }
}

impl WatchSource for HashMap<String, String> {
    fn observe(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl WatchSource for BTreeMap<String, String> {
    fn observe(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Fingerprints recorded at the end of `prepare`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub library: String,
    /// Missing in older manifests, which then never match
    #[serde(default)]
    pub requirements: String,
    pub aggregate: String,
    pub commands: BTreeMap<String, String>,
    pub watches: BTreeMap<String, String>,
}

impl Manifest {
    /// # Errors
    ///
    /// Returns `Serialization` if a command descriptor cannot be serialized.
    pub fn compute(registry: &CommandRegistry, watch: &dyn WatchSource) -> Result<Self> {
        let fingerprint = RegistryFingerprint::compute(registry)?;
        let watches = registry
            .iter()
            .flat_map(|c| c.meta().watch_values.iter())
            .map(|key| {
                (
                    key.clone(),
                    watch_fingerprint(watch.observe(key).as_deref()),
                )
            })
            .collect();
        Ok(Self {
            library: fingerprint.library,
            requirements: fingerprint.requirements,
            aggregate: fingerprint.aggregate,
            commands: fingerprint.commands,
            watches,
        })
    }
}

/// Reverse index entry for one cached top-level bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub cache_key: String,
    pub command_ids: BTreeSet<String>,
}

/// Per-node cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBundle {
    pub bundle: Bundle,
    /// Process-wide state written while compiling the bundle
    pub global_delta: StateMap,
}

/// What `prepare` decided to throw away
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub full_wipe: bool,
    /// Commands added, removed or modified since the last run
    pub changed_commands: BTreeSet<String>,
    /// Changed commands, watch-value dependents and their one-level watchers
    pub invalidated: BTreeSet<String>,
    /// Identities of purged bundles
    pub purged_bundles: Vec<String>,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        !self.full_wipe && self.invalidated.is_empty() && self.purged_bundles.is_empty()
    }
}

/// Bundle-level cache consulted by the compiler
pub trait BundleCache {
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn lookup(&mut self, content_hash: &str) -> Result<Option<CachedBundle>>;

    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn record(&mut self, content_hash: &str, bundle: &Bundle, global_delta: &StateMap)
        -> Result<()>;
}

/// Content-hash keyed bundle cache with precise invalidation
#[derive(Debug)]
pub struct IncrementalCache<S: CacheStore> {
    store: S,
    directory: Option<BTreeMap<String, DirectoryEntry>>,
    hits: u64,
    misses: u64,
}

impl<S: CacheStore> IncrementalCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            directory: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn node_key(content_hash: &str) -> String {
        format!("{}{}", NODE_KEY_PREFIX, content_hash)
    }

    /// Compare the registry and watched values with the previous run
    ///
    /// A changed library identity, a changed requirement fingerprint (a
    /// command added, removed, reordered or given new requirements), or a
    /// missing manifest in a store that already holds bundles wipes
    /// everything. Otherwise only bundles whose command trail intersects the
    /// invalidated commands are purged. The new
    /// manifest is saved before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn prepare(
        &mut self,
        registry: &CommandRegistry,
        watch: &dyn WatchSource,
    ) -> Result<Invalidation> {
        let current = Manifest::compute(registry, watch)?;
        let previous: Option<Manifest> = self.read_json(MANIFEST_KEY)?;
        let mut invalidation = Invalidation::default();

        match previous {
            None => {
                invalidation.full_wipe = !self.load_directory()?.is_empty();
                self.wipe()?;
            }
            Some(prev) if prev.library != current.library => {
                invalidation.full_wipe = true;
                self.wipe()?;
            }
            Some(prev) if prev.requirements != current.requirements => {
                invalidation.full_wipe = true;
                invalidation.changed_commands = diff_commands(&prev.commands, &current.commands);
                invalidation.invalidated = invalidation.changed_commands.clone();
                invalidation.purged_bundles = self.load_directory()?.into_keys().collect();
                self.wipe()?;
            }
            Some(prev) => {
                if prev.aggregate != current.aggregate {
                    invalidation.changed_commands = diff_commands(&prev.commands, &current.commands);
                }
                let mut invalidated = invalidation.changed_commands.clone();

                let changed_watches: BTreeSet<&String> = current
                    .watches
                    .iter()
                    .filter(|(k, v)| prev.watches.get(*k) != Some(*v))
                    .map(|(k, _)| k)
                    .collect();
                for command in registry.iter() {
                    if command
                        .meta()
                        .watch_values
                        .iter()
                        .any(|w| changed_watches.contains(w))
                    {
                        invalidated.insert(command.id().to_string());
                    }
                }

                // One level of watch propagation
                let direct: Vec<String> = invalidated.iter().cloned().collect();
                for id in &direct {
                    invalidated.extend(registry.dependents_of(id).into_iter().map(String::from));
                }

                invalidation.purged_bundles = self.purge(&invalidated)?;
                invalidation.invalidated = invalidated;
            }
        }

        self.write_json(MANIFEST_KEY, &current)?;
        tracing::debug!(
            full_wipe = invalidation.full_wipe,
            invalidated = invalidation.invalidated.len(),
            purged = invalidation.purged_bundles.len(),
            "cache prepared"
        );
        Ok(invalidation)
    }

    /// Purge bundles whose trail contains any of `command_ids`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn invalidate_commands(&mut self, command_ids: &BTreeSet<String>) -> Result<Vec<String>> {
        self.purge(command_ids)
    }

    fn purge(&mut self, command_ids: &BTreeSet<String>) -> Result<Vec<String>> {
        if command_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut directory = self.load_directory()?;
        let doomed: Vec<String> = directory
            .iter()
            .filter(|(_, entry)| !entry.command_ids.is_disjoint(command_ids))
            .map(|(identity, _)| identity.clone())
            .collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }
        for identity in &doomed {
            if let Some(entry) = directory.remove(identity) {
                self.store.remove_item(&entry.cache_key)?;
            }
        }
        self.save_directory(directory)?;
        Ok(doomed)
    }

    /// Drop every record
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn clear(&mut self) -> Result<()> {
        self.wipe()
    }

    fn wipe(&mut self) -> Result<()> {
        self.store.clear()?;
        self.directory = Some(BTreeMap::new());
        Ok(())
    }

    /// Current bundle directory
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn directory(&mut self) -> Result<&BTreeMap<String, DirectoryEntry>> {
        self.load_directory()?;
        Ok(self.directory.get_or_insert_with(BTreeMap::new))
    }

    fn load_directory(&mut self) -> Result<BTreeMap<String, DirectoryEntry>> {
        if let Some(directory) = &self.directory {
            return Ok(directory.clone());
        }
        let directory: BTreeMap<String, DirectoryEntry> =
            self.read_json(DIRECTORY_KEY)?.unwrap_or_default();
        self.directory = Some(directory.clone());
        Ok(directory)
    }

    fn save_directory(&mut self, directory: BTreeMap<String, DirectoryEntry>) -> Result<()> {
        self.write_json(DIRECTORY_KEY, &directory)?;
        self.directory = Some(directory);
        Ok(())
    }

    /// Read a JSON record; undecodable records are removed and reported missing
    fn read_json<T: serde::de::DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let corrupt = ConceptoError::CacheCorrupt {
                    key: key.to_string(),
                    reason: err.to_string(),
                };
                tracing::warn!(key, error = %corrupt, "dropping corrupt cache record");
                self.store.remove_item(key)?;
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set_item(key, &raw)?;
        Ok(())
    }
}

impl<S: CacheStore> BundleCache for IncrementalCache<S> {
    fn lookup(&mut self, content_hash: &str) -> Result<Option<CachedBundle>> {
        let found: Option<CachedBundle> = self.read_json(&Self::node_key(content_hash))?;
        match found {
            Some(cached) => {
                self.hits += 1;
                Ok(Some(cached))
            }
            None => {
                self.misses += 1;
                Ok(None)
            }
        }
    }

    fn record(
        &mut self,
        content_hash: &str,
        bundle: &Bundle,
        global_delta: &StateMap,
    ) -> Result<()> {
        if !bundle.is_valid() {
            return Ok(());
        }
        let key = Self::node_key(content_hash);
        self.write_json(
            &key,
            &CachedBundle {
                bundle: bundle.clone(),
                global_delta: global_delta.clone(),
            },
        )?;

        let mut directory = self.load_directory()?;
        let previous = directory.insert(
            bundle.identity.clone(),
            DirectoryEntry {
                cache_key: key.clone(),
                command_ids: bundle.trail.iter().cloned().collect(),
            },
        );
        if let Some(old) = previous {
            if old.cache_key != key {
                self.store.remove_item(&old.cache_key)?;
            }
        }
        self.save_directory(directory)
    }
}

fn diff_commands(
    previous: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = current
        .iter()
        .filter(|(id, hash)| previous.get(*id) != Some(*hash))
        .map(|(id, _)| id.clone())
        .collect();
    changed.extend(
        previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .cloned(),
    );
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::compiler::BundleStatus;
    use crate::model::{Emission, ExecContext, Node};
    use crate::registry::{Command, CommandMeta, LibraryMeta, RequirementSet};

    fn cmd(id: &str, revision: &str, meta: CommandMeta) -> Command {
        Command::new(id, RequirementSet::new(), |_n: &Node, _c: &ExecContext<'_>| {
            Ok(Emission::new().into())
        })
        .unwrap()
        .with_meta(CommandMeta {
            revision: revision.to_string(),
            ..meta
        })
    }

    fn registry(page_rev: &str) -> CommandRegistry {
        let mut r = CommandRegistry::new(LibraryMeta::new("lib", "1"));
        r.register(cmd("page", page_rev, CommandMeta::default())).unwrap();
        r.register(cmd("text", "1", CommandMeta::default())).unwrap();
        r.register(cmd(
            "store",
            "1",
            CommandMeta {
                watch_commands: vec!["page".to_string()],
                watch_values: vec!["api_url".to_string()],
                ..Default::default()
            },
        ))
        .unwrap();
        r
    }

    fn bundle(identity: &str, trail: &[&str]) -> Bundle {
        Bundle {
            identity: identity.to_string(),
            trail: trail.iter().map(|s| s.to_string()).collect(),
            status: BundleStatus::Valid,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_run_on_empty_store_is_not_a_wipe() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        let inv = cache.prepare(&registry("1"), &NoWatchSource).unwrap();
        assert!(inv.is_empty());
        assert!(cache.store().get_item(MANIFEST_KEY).unwrap().is_some());
    }

    #[test]
    fn test_changed_command_purges_only_its_bundles() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        cache.prepare(&registry("1"), &NoWatchSource).unwrap();
        cache
            .record("h1", &bundle("a", &["page", "text"]), &StateMap::new())
            .unwrap();
        cache
            .record("h2", &bundle("b", &["text"]), &StateMap::new())
            .unwrap();
        cache
            .record("h3", &bundle("c", &["store"]), &StateMap::new())
            .unwrap();

        let inv = cache.prepare(&registry("2"), &NoWatchSource).unwrap();
        assert!(!inv.full_wipe);
        assert_eq!(inv.changed_commands, BTreeSet::from(["page".to_string()]));
        // store watches page
        assert!(inv.invalidated.contains("store"));
        assert_eq!(inv.purged_bundles, vec!["a", "c"]);

        assert!(cache.lookup("h1").unwrap().is_none());
        assert!(cache.lookup("h2").unwrap().is_some());
        assert!(cache.lookup("h3").unwrap().is_none());
    }

    #[test]
    fn test_watched_value_change_invalidates_watcher() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        let mut watch = HashMap::new();
        watch.insert("api_url".to_string(), "http://a".to_string());
        cache.prepare(&registry("1"), &watch).unwrap();
        cache
            .record("h3", &bundle("c", &["store"]), &StateMap::new())
            .unwrap();

        let inv = cache.prepare(&registry("1"), &watch).unwrap();
        assert!(inv.is_empty());

        watch.insert("api_url".to_string(), "http://b".to_string());
        let inv = cache.prepare(&registry("1"), &watch).unwrap();
        assert!(inv.changed_commands.is_empty());
        assert_eq!(inv.purged_bundles, vec!["c"]);
    }

    #[test]
    fn test_added_command_forces_full_wipe() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        cache.prepare(&registry("1"), &NoWatchSource).unwrap();
        cache
            .record("h2", &bundle("b", &["text"]), &StateMap::new())
            .unwrap();

        let mut extended = registry("1");
        extended
            .register(cmd("title", "1", CommandMeta::default()))
            .unwrap();
        let inv = cache.prepare(&extended, &NoWatchSource).unwrap();
        assert!(inv.full_wipe);
        assert_eq!(inv.changed_commands, BTreeSet::from(["title".to_string()]));
        assert_eq!(inv.purged_bundles, vec!["b"]);
        assert!(cache.lookup("h2").unwrap().is_none());
        assert!(cache.directory().unwrap().is_empty());
    }

    #[test]
    fn test_library_change_forces_full_wipe() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        cache.prepare(&registry("1"), &NoWatchSource).unwrap();
        cache
            .record("h2", &bundle("b", &["text"]), &StateMap::new())
            .unwrap();

        let mut upgraded = registry("1");
        upgraded.set_library(LibraryMeta::new("lib", "2"));
        let inv = cache.prepare(&upgraded, &NoWatchSource).unwrap();
        assert!(inv.full_wipe);
        assert!(cache.lookup("h2").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let mut store = MemoryCacheStore::new();
        store
            .set_item(&IncrementalCache::<MemoryCacheStore>::node_key("bad"), "{not json")
            .unwrap();
        let mut cache = IncrementalCache::new(store);
        assert!(cache.lookup("bad").unwrap().is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.store().len(), 0);
    }

    #[test]
    fn test_error_bundles_are_not_recorded() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        let mut failed = bundle("a", &["page"]);
        failed.status = BundleStatus::Error {
            code: "ERR_HANDLER_FAILURE".to_string(),
            message: "x".to_string(),
        };
        cache.record("h1", &failed, &StateMap::new()).unwrap();
        assert!(cache.lookup("h1").unwrap().is_none());
    }

    #[test]
    fn test_recompiled_identity_replaces_old_record() {
        let mut cache = IncrementalCache::new(MemoryCacheStore::new());
        cache.record("old", &bundle("a", &["page"]), &StateMap::new()).unwrap();
        cache.record("new", &bundle("a", &["page"]), &StateMap::new()).unwrap();
        assert!(cache.lookup("old").unwrap().is_none());
        assert!(cache.lookup("new").unwrap().is_some());
        assert_eq!(cache.directory().unwrap().len(), 1);
    }
}
