//! Compilation run orchestration.
//!
//! ## Pipeline (in order):
//! 1. Reconcile the cache with the registry (skipped when caching is off)
//! 2. Compile every top-level node, restoring unchanged bundles
//! 3. Hand valid bundles to the sink and return the report

use std::time::Instant;

use concepto_core::errors::ExError;
use concepto_core::{
    log_op_end, log_op_start, AbortHandle, ArtifactSink, CacheStore, CommandRegistry,
    CompileHooks, CompileReport, Compiler, CompilerConfig, DocumentQuery, IncrementalCache,
    Invalidation, RunStatus, StateMap, WatchSource,
};
use concepto_core_types::RunContext;
use concepto_store::errors::Result;

/// Options for one compilation run
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub config: CompilerConfig,
    pub abort: AbortHandle,
    /// Correlation ids; a fresh run id is generated when absent
    pub context: Option<RunContext>,
    /// Process-wide state the run starts from
    pub initial_state: StateMap,
}

/// Result of a compilation run
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub report: CompileReport,
    /// What the cache dropped before compiling; `None` when caching was off
    pub invalidation: Option<Invalidation>,
}

/// Compile a document against a registry, using `store` for the cache
///
/// Node-level failures end up in the report; only cache reconciliation
/// failures are returned as errors.
///
/// # Errors
///
/// Returns an `ExError` if the cache store cannot be read or written while
/// reconciling it with the registry.
pub fn compile_document<D, S>(
    doc: &D,
    registry: &CommandRegistry,
    store: S,
    watch: &dyn WatchSource,
    hooks: Option<&mut dyn CompileHooks>,
    sink: Option<&mut dyn ArtifactSink>,
    options: CompileOptions,
) -> Result<CompileOutcome>
where
    D: DocumentQuery + ?Sized,
    S: CacheStore,
{
    let start = Instant::now();
    let CompileOptions {
        config,
        abort,
        context,
        initial_state,
    } = options;
    let context = context.unwrap_or_else(RunContext::new);
    log_op_start!(
        "compile_document",
        run_id = %context.run_id,
        use_cache = config.use_cache
    );

    let mut cache = IncrementalCache::new(store);
    let invalidation = if config.use_cache {
        Some(cache.prepare(registry, watch).map_err(ExError::from)?)
    } else {
        None
    };

    let mut compiler = Compiler::new(doc, registry)
        .with_config(config.clone())
        .with_abort(abort)
        .with_context(context)
        .with_global_state(initial_state);
    if config.use_cache {
        compiler = compiler.with_cache(&mut cache);
    }
    if let Some(hooks) = hooks {
        compiler = compiler.with_hooks(hooks);
    }
    if let Some(sink) = sink {
        compiler = compiler.with_sink(sink);
    }
    let report = compiler.run();

    if report.status != RunStatus::Success {
        tracing::warn!(
            status = ?report.status,
            errors = report.errors.len(),
            aborted = report.aborted(),
            "compilation did not fully succeed"
        );
    }
    log_op_end!(
        "compile_document",
        duration_ms = start.elapsed().as_millis() as u64,
        bundles = report.bundles.len(),
        cache_hits = report.cache_hits
    );

    Ok(CompileOutcome {
        report,
        invalidation,
    })
}
