use thiserror::Error;

/// Result type alias using ConceptoError
pub type Result<T> = std::result::Result<T, ConceptoError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// for tests and for the structured `err.code` logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Registration/Validation
    InvalidRequirement,
    ReservedCommandId,
    InvalidDocument,
    NotFound,

    // Resolution
    CommandNotFound,
    HandlerFailure,
    NoValidCandidate,

    // Run control
    AbortRequested,

    // Cache
    CacheCorrupt,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    ExternalService,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidRequirement => "ERR_INVALID_REQUIREMENT",
            ExErrorKind::ReservedCommandId => "ERR_RESERVED_COMMAND_ID",
            ExErrorKind::InvalidDocument => "ERR_INVALID_DOCUMENT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::CommandNotFound => "ERR_COMMAND_NOT_FOUND",
            ExErrorKind::HandlerFailure => "ERR_HANDLER_FAILURE",
            ExErrorKind::NoValidCandidate => "ERR_NO_VALID_CANDIDATE",
            ExErrorKind::AbortRequested => "ERR_ABORT_REQUESTED",
            ExErrorKind::CacheCorrupt => "ERR_CACHE_CORRUPT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind for programmatic handling and optional
/// node/command context for diagnostics. Store implementations report
/// their failures with this type.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    node_id: Option<String>,
    command_id: Option<String>,
    message: String,
    candidates: Option<Vec<String>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            node_id: None,
            command_id: None,
            message: String::new(),
            candidates: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add node ID context
    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Add command ID context
    pub fn with_command_id(mut self, id: impl Into<String>) -> Self {
        self.command_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add candidate command ids (used for NoValidCandidate)
    pub fn with_candidates(mut self, ids: Vec<String>) -> Self {
        self.candidates = Some(ids);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the node ID context, if any
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Get the command ID context, if any
    pub fn command_id(&self) -> Option<&str> {
        self.command_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get candidate command ids, if any
    pub fn candidates(&self) -> Option<&[String]> {
        self.candidates.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(node_id) = &self.node_id {
            write!(f, " (node_id: {})", node_id)?;
        }
        if let Some(command_id) = &self.command_id {
            write!(f, " (command_id: {})", command_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for matching, resolution, compilation and caching
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConceptoError {
    // ===== Resolution Errors =====
    /// No command's requirement set matched the node
    #[error("No command matches node {node_id}")]
    NoMatchingCommand { node_id: String },

    /// The matched command's handler raised an error
    #[error("Command {command_id} failed on node {node_id}: {message}{}", at_location(.location))]
    HandlerFailed {
        node_id: String,
        command_id: String,
        message: String,
        location: Option<String>,
    },

    /// Candidates existed but none of them confirmed validity
    #[error("No valid command for node {node_id} among candidates {candidates:?}")]
    NoValidCandidate {
        node_id: String,
        candidates: Vec<String>,
        failures: Vec<String>,
    },

    /// Cooperative cancellation was observed
    #[error("Compilation aborted on request at node {node_id}")]
    AbortRequested { node_id: String },

    // ===== Registration Errors =====
    /// A requirement value could not be parsed
    #[error("Invalid {kind} requirement on command {command_id}: {reason}")]
    InvalidRequirement {
        command_id: String,
        kind: String,
        reason: String,
    },

    /// The command id is reserved for the library metadata record
    #[error("Command id {command_id} is reserved")]
    ReservedCommandId { command_id: String },

    // ===== Document Errors =====
    /// A referenced node does not exist in the document
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// The document tree is malformed
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    // ===== Cache Errors =====
    /// The cache store reported a failure
    #[error("Cache store error [{code}]: {message}")]
    CacheStore { code: String, message: String },

    /// A cache record could not be decoded
    #[error("Corrupt cache record {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },

    // ===== Output Errors =====
    /// The artifact sink failed to write bundles
    #[error("Artifact sink failed: {message}")]
    ArtifactSink { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn at_location(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|l| format!(" (at {})", l))
        .unwrap_or_default()
}

impl ConceptoError {
    /// Whether this failure invalidates only the current branch
    ///
    /// Resolution failures halt the branch they occur in; everything else
    /// is either a run-level condition or an infrastructure failure.
    pub fn is_branch_failure(&self) -> bool {
        matches!(
            self,
            ConceptoError::NoMatchingCommand { .. }
                | ConceptoError::HandlerFailed { .. }
                | ConceptoError::NoValidCandidate { .. }
        )
    }
}

impl From<ConceptoError> for ExError {
    fn from(err: ConceptoError) -> Self {
        let message = err.to_string();
        match err {
            ConceptoError::NoMatchingCommand { node_id } => {
                ExError::new(ExErrorKind::CommandNotFound).with_node_id(node_id)
            }
            ConceptoError::HandlerFailed {
                node_id,
                command_id,
                ..
            } => ExError::new(ExErrorKind::HandlerFailure)
                .with_node_id(node_id)
                .with_command_id(command_id),
            ConceptoError::NoValidCandidate {
                node_id,
                candidates,
                ..
            } => ExError::new(ExErrorKind::NoValidCandidate)
                .with_node_id(node_id)
                .with_candidates(candidates),
            ConceptoError::AbortRequested { node_id } => {
                ExError::new(ExErrorKind::AbortRequested).with_node_id(node_id)
            }
            ConceptoError::InvalidRequirement { command_id, .. } => {
                ExError::new(ExErrorKind::InvalidRequirement).with_command_id(command_id)
            }
            ConceptoError::ReservedCommandId { command_id } => {
                ExError::new(ExErrorKind::ReservedCommandId).with_command_id(command_id)
            }
            ConceptoError::NodeNotFound { node_id } => {
                ExError::new(ExErrorKind::NotFound).with_node_id(node_id)
            }
            ConceptoError::InvalidDocument { .. } => ExError::new(ExErrorKind::InvalidDocument),
            ConceptoError::CacheStore { .. } => ExError::new(ExErrorKind::Persistence),
            ConceptoError::CacheCorrupt { .. } => ExError::new(ExErrorKind::CacheCorrupt),
            ConceptoError::ArtifactSink { .. } => ExError::new(ExErrorKind::ExternalService),
            ConceptoError::Serialization { .. } => ExError::new(ExErrorKind::Serialization),
            ConceptoError::Internal { .. } => ExError::new(ExErrorKind::Internal),
        }
        .with_message(message)
    }
}

impl From<ExError> for ConceptoError {
    fn from(err: ExError) -> Self {
        ConceptoError::CacheStore {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConceptoError {
    fn from(err: serde_json::Error) -> Self {
        ConceptoError::Serialization {
            message: err.to_string(),
        }
    }
}
