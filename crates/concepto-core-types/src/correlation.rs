//! Correlation types for compilation run tracking
//!
//! Every compilation run gets a `RunId`. The compiler records it on its
//! `compile` span and in the run's report, so the structured events of one
//! run can be matched with its result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single compilation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// UUIDv7, so ids sort by start time
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context handed to a compilation run by its caller
///
/// Callers that need to know the run id before the run starts build the
/// context themselves; otherwise the compiler creates a fresh one.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub run_id: RunId,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}
