use thiserror::Error;

/// Core error type for the approval step builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A draft or step failed business validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A record the caller referenced does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store failed without a structured error code
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// The backing store returned a structured error
    #[error("Remote error{}: {message}", code_suffix(.code))]
    Remote {
        /// Store specific error code (SQLSTATE or API code)
        code: Option<String>,
        /// Message reported by the store
        message: String,
    },

    /// The delete phase of a replace-all write committed but the insert did not
    #[error("Partial write for workflow {workflow_id}: {message}")]
    PartialWrite {
        /// Workflow whose steps were deleted
        workflow_id: String,
        /// Cause of the insert failure
        message: String,
    },

    /// The workflow could not be looked up or created
    #[error("Workflow resolution error: {0}")]
    ResolutionError(String),

    /// Another mutation is already in flight for this session
    #[error("A save is already in progress")]
    SessionBusy,

    /// A step index did not address an element of the list
    #[error("Step index {index} out of range for {len} steps")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the list
        len: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default()
}

impl CoreError {
    /// Build a remote error from a code and message
    pub fn remote(code: Option<&str>, message: impl Into<String>) -> Self {
        CoreError::Remote {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether the error was caught before any I/O happened
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_) | CoreError::IndexOutOfRange { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}
