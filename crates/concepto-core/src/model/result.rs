use super::state::StateMap;
use crate::errors::ConceptoError;
use serde::{Deserialize, Serialize};

/// Output fragments and state deltas produced by a valid handler reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Emission {
    /// Appended to the bundle's init section
    pub init: String,
    /// Appended to the code body before children are visited
    pub open: String,
    /// Appended to the code body after children are visited
    pub close: String,
    /// When false the node's children are not visited
    pub has_children: bool,
    /// Merged into the branch state handed to children
    pub state: StateMap,
    /// Merged into the parent's branch state for following siblings
    pub upward: StateMap,
    /// Merged into the process-wide state
    pub global: StateMap,
}

impl Default for Emission {
    fn default() -> Self {
        Self {
            init: String::new(),
            open: String::new(),
            close: String::new(),
            has_children: true,
            state: StateMap::new(),
            upward: StateMap::new(),
            global: StateMap::new(),
        }
    }
}

impl Emission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(mut self, text: impl Into<String>) -> Self {
        self.init = text.into();
        self
    }

    pub fn open(mut self, text: impl Into<String>) -> Self {
        self.open = text.into();
        self
    }

    pub fn close(mut self, text: impl Into<String>) -> Self {
        self.close = text.into();
        self
    }

    pub fn no_children(mut self) -> Self {
        self.has_children = false;
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.state.insert(key, value);
        self
    }

    pub fn upward(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.upward.insert(key, value);
        self
    }

    pub fn global(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.global.insert(key, value);
        self
    }
}

/// What a handler reports for a node it was asked to process
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Valid(Emission),
    /// The handler declines the node; resolution moves on to the next candidate
    Invalid,
}

impl From<Emission> for Reply {
    fn from(emission: Emission) -> Self {
        Reply::Valid(emission)
    }
}

/// Failure raised by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub message: String,
    pub location: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Build an error tagged with the caller's source location
    #[track_caller]
    pub fn here(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            location: Some(format!("{}:{}:{}", location.file(), location.line(), location.column())),
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for HandlerError {}

pub type HandlerResult = std::result::Result<Reply, HandlerError>;

/// Outcome of invoking one command against one node
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Valid(Emission),
    Invalid,
    Error(HandlerError),
}

impl From<HandlerResult> for ExecutionResult {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(Reply::Valid(emission)) => ExecutionResult::Valid(emission),
            Ok(Reply::Invalid) => ExecutionResult::Invalid,
            Err(err) => ExecutionResult::Error(err),
        }
    }
}

impl ExecutionResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ExecutionResult::Valid(_))
    }

    /// Convert a handler error into the domain error for `node_id`
    pub fn into_error(err: HandlerError, node_id: &str, command_id: &str) -> ConceptoError {
        ConceptoError::HandlerFailed {
            node_id: node_id.to_string(),
            command_id: command_id.to_string(),
            message: err.message,
            location: err.location,
        }
    }
}
