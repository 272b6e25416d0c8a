//! Tree compiler
//!
//! Compiles every node at `entry_level` into an independent [`Bundle`]:
//! the node and its subtree are resolved top-down, handler fragments are
//! appended around each node's children, branch state is threaded down
//! the recursion and process-wide state is shared by the whole run.
//!
//! A failing node invalidates its whole top-level bundle and stops the
//! remaining siblings of its branch; other top-level bundles still
//! compile. Cancellation is cooperative and only observed between nodes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use concepto_core_types::{RunContext, RunId};
use serde::{Deserialize, Serialize};

use crate::cache::BundleCache;
use crate::document::{DocumentQuery, NodeFilter};
use crate::errors::{ConceptoError, ExError};
use crate::hooks::{ArtifactSink, CompileHooks, DefaultHooks};
use crate::model::{Node, StateMap};
use crate::registry::CommandRegistry;
use crate::resolver::Resolver;
use crate::{log_op_end, log_op_error, log_op_start};

/// Compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Level of the nodes that become top-level bundles
    pub entry_level: u32,
    pub use_cache: bool,
    /// Log per-node decisions at `info` instead of `debug`
    pub debug: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            entry_level: 2,
            use_cache: true,
            debug: false,
        }
    }
}

/// Cooperative cancellation flag, shareable across threads
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BundleStatus {
    #[default]
    Valid,
    Error {
        code: String,
        message: String,
    },
}

/// Compiled output of one top-level node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bundle {
    /// Id of the top-level node
    pub identity: String,
    pub name: String,
    pub file: String,
    pub title: String,
    pub attributes: BTreeMap<String, String>,
    pub init: String,
    pub code: String,
    /// Resolved command ids in visit order
    pub trail: Vec<String>,
    pub status: BundleStatus,
}

impl Bundle {
    fn for_node(node: &Node, hooks: &dyn CompileHooks) -> Self {
        Self {
            identity: node.id.clone(),
            name: hooks.define_node_name(node),
            file: hooks.define_filename(node),
            title: hooks.define_title(node),
            attributes: node.attributes.clone(),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == BundleStatus::Valid
    }
}

/// A failure recorded during a run
#[derive(Debug, Clone, PartialEq)]
pub struct NodeError {
    /// Top-level bundle the failure belongs to; empty for run-level failures
    pub identity: String,
    /// Node that failed
    pub node_id: String,
    pub error: ConceptoError,
}

impl NodeError {
    fn new(identity: &str, error: ConceptoError) -> Self {
        let node_id = ExError::from(error.clone())
            .node_id()
            .unwrap_or(identity)
            .to_string();
        Self {
            identity: identity.to_string(),
            node_id,
            error,
        }
    }

    pub fn code(&self) -> &'static str {
        ExError::from(self.error.clone()).code()
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Aborted, or some bundles failed while others compiled
    Partial,
    Failed,
}

/// Structured result of a compilation run
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub bundles: Vec<Bundle>,
    pub errors: Vec<NodeError>,
    /// Where a requested abort was observed; its bundle is not in `bundles`
    pub abort: Option<NodeError>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub handler_calls: u64,
    /// Process-wide state at the end of the run
    pub global: StateMap,
    pub duration_ms: u64,
}

impl CompileReport {
    pub fn valid_bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.iter().filter(|b| b.is_valid())
    }

    pub fn bundle(&self, identity: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.identity == identity)
    }

    pub fn aborted(&self) -> bool {
        self.abort.is_some()
    }
}

enum Halt {
    /// Abort observed before visiting the given node
    Abort(String),
    Failed(ConceptoError),
}

/// One-shot compiler for a document and a registry
///
/// `run` consumes the compiler; a new one is built per run.
pub struct Compiler<'a, D: DocumentQuery + ?Sized> {
    doc: &'a D,
    registry: &'a CommandRegistry,
    config: CompilerConfig,
    hooks: Option<&'a mut dyn CompileHooks>,
    cache: Option<&'a mut dyn BundleCache>,
    sink: Option<&'a mut dyn ArtifactSink>,
    abort: AbortHandle,
    context: RunContext,
    global: StateMap,
}

impl<'a, D: DocumentQuery + ?Sized> Compiler<'a, D> {
    pub fn new(doc: &'a D, registry: &'a CommandRegistry) -> Self {
        Self {
            doc,
            registry,
            config: CompilerConfig::default(),
            hooks: None,
            cache: None,
            sink: None,
            abort: AbortHandle::new(),
            context: RunContext::new(),
            global: StateMap::new(),
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: &'a mut dyn CompileHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_cache(mut self, cache: &'a mut dyn BundleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: &'a mut dyn ArtifactSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    /// Initial process-wide state
    pub fn with_global_state(mut self, global: StateMap) -> Self {
        self.global = global;
        self
    }

    /// Compile every top-level node
    ///
    /// Never fails as a whole: failures are collected in the report.
    pub fn run(self) -> CompileReport {
        let Compiler {
            doc,
            registry,
            config,
            hooks,
            mut cache,
            sink,
            abort,
            context,
            mut global,
        } = self;

        let span = tracing::info_span!("compile", run_id = %context.run_id);
        let _guard = span.enter();
        let start = Instant::now();
        log_op_start!("compile", entry_level = config.entry_level);

        let mut default_hooks = DefaultHooks;
        let hooks: &mut dyn CompileHooks = match hooks {
            Some(h) => h,
            None => &mut default_hooks,
        };
        if !config.use_cache {
            cache = None;
        }

        let mut resolver = Resolver::new(registry, doc).with_debug(config.debug);
        let mut bundles = Vec::new();
        let mut errors = Vec::new();
        let mut abort_at: Option<NodeError> = None;
        let (mut cache_hits, mut cache_misses) = (0u64, 0u64);

        hooks.prepare();
        let top_level = doc.get_nodes(&NodeFilter::level(config.entry_level));

        for node in top_level {
            if abort.is_requested() {
                abort_at = Some(NodeError::new(
                    &node.id,
                    ConceptoError::AbortRequested {
                        node_id: node.id.clone(),
                    },
                ));
                break;
            }

            if let Some(cache) = cache.as_deref_mut() {
                match cache.lookup(&node.content_hash) {
                    Ok(Some(hit)) => {
                        cache_hits += 1;
                        global.merge(&hit.global_delta);
                        tracing::debug!(node_id = %node.id, "bundle restored from cache");
                        bundles.push(hit.bundle);
                        continue;
                    }
                    Ok(None) => cache_misses += 1,
                    Err(err) => {
                        cache_misses += 1;
                        tracing::warn!(node_id = %node.id, error = %err, "cache lookup failed");
                    }
                }
            }

            let before = global.clone();
            let mut bundle = Bundle::for_node(node, hooks);
            let mut walker = Walker {
                doc,
                resolver: &mut resolver,
                global: &mut global,
                abort: &abort,
            };
            match walker.visit(node, &StateMap::new(), &mut bundle) {
                Ok(_) => {}
                Err(Halt::Abort(node_id)) => {
                    // The in-progress bundle is discarded with its state changes
                    global = before;
                    abort_at = Some(NodeError::new(
                        &node.id,
                        ConceptoError::AbortRequested { node_id },
                    ));
                    break;
                }
                Err(Halt::Failed(err)) => {
                    let node_error = NodeError::new(&node.id, err);
                    bundle.status = BundleStatus::Error {
                        code: node_error.code().to_string(),
                        message: node_error.message(),
                    };
                    if node_error.error.is_branch_failure() {
                        tracing::warn!(
                            node_id = %node_error.node_id,
                            err.code = node_error.code(),
                            "branch failed"
                        );
                    } else {
                        tracing::error!(
                            node_id = %node_error.node_id,
                            err.code = node_error.code(),
                            error = %node_error.error,
                            "bundle failed outside resolution"
                        );
                    }
                    hooks.on_errors(&[node_error.message()]);
                    errors.push(node_error);
                }
            }

            hooks.after_process(&mut bundle);
            hooks.complete_code_template(&mut bundle);

            if bundle.is_valid() {
                if let Some(cache) = cache.as_deref_mut() {
                    if let Err(err) = cache.record(&node.content_hash, &bundle, &global.diff(&before)) {
                        tracing::warn!(node_id = %node.id, error = %err, "cache record failed");
                    }
                }
            }
            bundles.push(bundle);
        }

        let aborted = abort_at.is_some();
        if errors.is_empty() && !aborted {
            if let Some(sink) = sink {
                if let Err(err) = sink.create_files(&bundles) {
                    hooks.on_errors(&[err.to_string()]);
                    errors.push(NodeError::new("", err));
                }
            }
        }

        let status = if aborted {
            RunStatus::Partial
        } else if errors.is_empty() {
            RunStatus::Success
        } else if bundles.iter().any(Bundle::is_valid) {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match (status, errors.first()) {
            (RunStatus::Failed, Some(first)) => {
                log_op_error!(
                    "compile",
                    first.error.clone(),
                    duration_ms = duration_ms,
                    bundles = bundles.len()
                );
            }
            _ => {
                log_op_end!(
                    "compile",
                    duration_ms = duration_ms,
                    bundles = bundles.len(),
                    errors = errors.len(),
                    aborted = aborted
                );
            }
        }

        CompileReport {
            run_id: context.run_id,
            status,
            bundles,
            errors,
            abort: abort_at,
            cache_hits,
            cache_misses,
            handler_calls: resolver.handler_calls(),
            global,
            duration_ms,
        }
    }
}

struct Walker<'w, 'r, D: DocumentQuery + ?Sized> {
    doc: &'r D,
    resolver: &'w mut Resolver<'r, D>,
    global: &'w mut StateMap,
    abort: &'w AbortHandle,
}

impl<D: DocumentQuery + ?Sized> Walker<'_, '_, D> {
    /// Compile a node and its subtree into `bundle`, returning its upward delta
    fn visit(
        &mut self,
        node: &Node,
        inherited: &StateMap,
        bundle: &mut Bundle,
    ) -> Result<StateMap, Halt> {
        if self.abort.is_requested() {
            return Err(Halt::Abort(node.id.clone()));
        }

        let resolution = self
            .resolver
            .resolve_valid(node, inherited, self.global)
            .map_err(Halt::Failed)?;
        let emission = resolution.emission;

        self.global.merge(&emission.global);
        bundle.init.push_str(&emission.init);
        bundle.code.push_str(&emission.open);
        bundle.trail.push(resolution.command_id);

        if emission.has_children {
            let doc = self.doc;
            let mut branch = inherited.merged(&emission.state);
            for child_id in &node.children {
                let child = doc.get_node(child_id).ok_or_else(|| {
                    Halt::Failed(ConceptoError::NodeNotFound {
                        node_id: child_id.clone(),
                    })
                })?;
                let upward = self.visit(child, &branch, bundle)?;
                branch.merge(&upward);
            }
        }

        bundle.code.push_str(&emission.close);
        Ok(emission.upward)
    }
}
