#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::BTreeSet;

use common::{app_document, app_registry};
use concepto_core::{CacheStore, MemoryCacheStore, NoWatchSource, RunStatus};
use concepto_engine::{
    apply_engine_command, cache_stats, show_bundle, CompileOptions, EngineCommand,
    EngineCommandResult,
};

fn compile_into(store: &mut MemoryCacheStore) -> EngineCommandResult {
    let doc = app_document();
    let registry = app_registry("1");
    apply_engine_command(
        EngineCommand::Compile {
            doc: &doc,
            registry: &registry,
            watch: &NoWatchSource,
            options: CompileOptions::default(),
        },
        store,
        None,
        None,
    )
    .unwrap()
}

#[test]
fn test_compile_command_fills_the_store() {
    let mut store = MemoryCacheStore::new();

    match compile_into(&mut store) {
        EngineCommandResult::Compiled(outcome) => {
            assert_eq!(outcome.report.status, RunStatus::Success)
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let stats = cache_stats(&store).unwrap();
    assert_eq!(stats.bundles, 2);
    assert_eq!(stats.orphans, 0);
    // manifest + directory + one record per bundle
    assert_eq!(stats.records, 4);
    assert!(stats.commands.contains("field"));
    assert!(stats.library.is_some());

    let cached = show_bundle(&store, "help").unwrap().unwrap();
    assert_eq!(cached.bundle.code, "<page help><p>faq</p></page>");
    assert!(show_bundle(&store, "missing").unwrap().is_none());
}

#[test]
fn test_invalidate_command_purges_matching_bundles() {
    let mut store = MemoryCacheStore::new();
    compile_into(&mut store);

    let result = apply_engine_command(
        EngineCommand::InvalidateCommands {
            command_ids: BTreeSet::from(["form".to_string()]),
        },
        &mut store,
        None,
        None,
    )
    .unwrap();

    match result {
        EngineCommandResult::Invalidated { purged_bundles } => {
            assert_eq!(purged_bundles, vec!["checkout"])
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(cache_stats(&store).unwrap().bundles, 1);
    assert!(show_bundle(&store, "checkout").unwrap().is_none());
}

#[test]
fn test_clear_command_empties_the_store() {
    let mut store = MemoryCacheStore::new();
    compile_into(&mut store);

    let result = apply_engine_command(
        EngineCommand::ClearCache,
        &mut store,
        None,
        None,
    )
    .unwrap();

    assert!(matches!(result, EngineCommandResult::Cleared));
    assert!(store.keys().unwrap().is_empty());
}

#[test]
fn test_recompile_after_invalidate_only_rebuilds_purged_bundle() {
    let mut store = MemoryCacheStore::new();
    compile_into(&mut store);
    apply_engine_command(
        EngineCommand::InvalidateCommands {
            command_ids: BTreeSet::from(["paragraph".to_string()]),
        },
        &mut store,
        None,
        None,
    )
    .unwrap();

    match compile_into(&mut store) {
        EngineCommandResult::Compiled(outcome) => {
            assert_eq!(outcome.report.cache_hits, 1);
            assert_eq!(outcome.report.cache_misses, 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
