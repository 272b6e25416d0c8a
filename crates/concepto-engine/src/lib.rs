//! Concepto Engine - Orchestration layer
//!
//! Coordinates one compilation run end to end: open the cache store,
//! reconcile it with the command registry, compile the document and report.
//! Cache maintenance (stats, clear, invalidate) goes through the same
//! command surface.

pub mod commands;
pub mod location;

pub use commands::cache_admin::{cache_stats, show_bundle, CacheStats};
pub use commands::compile::{compile_document, CompileOptions, CompileOutcome};
pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use location::StoreLocation;
