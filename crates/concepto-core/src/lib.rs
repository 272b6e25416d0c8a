//! Concepto Core - command matching and incremental tree compilation
//!
//! This crate turns a parsed hierarchical document (a tree of [`Node`]s)
//! into generated source bundles by matching user-registered commands
//! against every node:
//! - Typed requirement predicates parsed once at registration
//! - Command registry with additive merge and declaration order
//! - Ranked candidate resolution with validity confirmation and memoization
//! - Relationship queries over resolved ancestor/sibling commands
//! - Recursive tree compiler with branch and process-wide state
//! - Content-hash based incremental cache with precise invalidation

pub mod cache;
pub mod compiler;
pub mod document;
pub mod errors;
pub mod hooks;
pub mod logging_facility;
pub mod matcher;
pub mod model;
pub mod registry;
pub mod relations;
pub mod resolver;

// Re-export commonly used types
pub use cache::{
    BundleCache, CacheStore, IncrementalCache, Invalidation, MemoryCacheStore, NoWatchSource,
    WatchSource,
};
pub use compiler::{
    AbortHandle, Bundle, BundleStatus, CompileReport, Compiler, CompilerConfig, NodeError,
    RunStatus,
};
pub use document::{Document, DocumentQuery, NodeFilter, TreeNode};
pub use errors::{ConceptoError, ExError, ExErrorKind, Result};
pub use hooks::{ArtifactSink, CompileHooks, DefaultHooks, MemorySink};
pub use matcher::RequirementKind;
pub use model::{
    Emission, ExecContext, ExecutionResult, HandlerError, HandlerResult, Node, Reply, StateMap,
};
pub use registry::{
    Command, CommandHandler, CommandMeta, CommandRegistry, LibraryMeta, RequirementSet,
    META_COMMAND_ID,
};
pub use resolver::{MatchCandidate, Resolution, Resolver};
