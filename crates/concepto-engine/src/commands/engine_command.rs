//! Engine-level action commands for cache-backed operations.

use std::collections::BTreeSet;

use concepto_core::errors::ExError;
use concepto_core::{
    ArtifactSink, CacheStore, CommandRegistry, CompileHooks, DocumentQuery, IncrementalCache,
    WatchSource,
};
use concepto_store::errors::Result;

use crate::commands::compile::{compile_document, CompileOptions, CompileOutcome};

/// Engine-level commands that touch the cache store.
pub enum EngineCommand<'a> {
    /// Compile a document against a registry.
    Compile {
        doc: &'a dyn DocumentQuery,
        registry: &'a CommandRegistry,
        watch: &'a dyn WatchSource,
        options: CompileOptions,
    },
    /// Drop every cached record.
    ClearCache,
    /// Purge bundles whose trail uses any of the given commands.
    InvalidateCommands { command_ids: BTreeSet<String> },
}

impl std::fmt::Debug for EngineCommand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Compile { options, .. } => f
                .debug_struct("Compile")
                .field("options", options)
                .finish_non_exhaustive(),
            EngineCommand::ClearCache => f.write_str("ClearCache"),
            EngineCommand::InvalidateCommands { command_ids } => f
                .debug_struct("InvalidateCommands")
                .field("command_ids", command_ids)
                .finish(),
        }
    }
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Compiled(Box<CompileOutcome>),
    Cleared,
    Invalidated { purged_bundles: Vec<String> },
}

/// Apply an engine command against one cache store.
///
/// Hooks and sink are only consulted by `Compile`.
///
/// # Errors
///
/// Returns an `ExError` if the cache store fails.
pub fn apply_engine_command<S: CacheStore>(
    cmd: EngineCommand<'_>,
    store: S,
    hooks: Option<&mut dyn CompileHooks>,
    sink: Option<&mut dyn ArtifactSink>,
) -> Result<EngineCommandResult> {
    tracing::debug!(command = ?cmd, "applying engine command");
    match cmd {
        EngineCommand::Compile {
            doc,
            registry,
            watch,
            options,
        } => {
            let outcome = compile_document(doc, registry, store, watch, hooks, sink, options)?;
            Ok(EngineCommandResult::Compiled(Box::new(outcome)))
        }
        EngineCommand::ClearCache => {
            IncrementalCache::new(store).clear().map_err(ExError::from)?;
            tracing::info!("cache cleared");
            Ok(EngineCommandResult::Cleared)
        }
        EngineCommand::InvalidateCommands { command_ids } => {
            let purged_bundles = IncrementalCache::new(store)
                .invalidate_commands(&command_ids)
                .map_err(ExError::from)?;
            tracing::info!(
                commands = command_ids.len(),
                purged = purged_bundles.len(),
                "commands invalidated"
            );
            Ok(EngineCommandResult::Invalidated { purged_bundles })
        }
    }
}
