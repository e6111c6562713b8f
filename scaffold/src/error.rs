use thiserror::Error;

/// Result type for scaffold operations.
pub type Result<T> = std::result::Result<T, ScaffoldError>;

/// Errors that can occur while resolving, fetching or creating through a scaffold.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    /// No model with this name has been defined in the registry
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// No scaffold with this name has been registered with the provider
    #[error("Scaffold not registered: {0}")]
    ScaffoldNotRegistered(String),

    /// A page operation was attempted on a scaffold without pagination
    #[error("Pagination is not enabled for scaffold {0}")]
    PaginationDisabled(String),

    /// Page numbers start at 1
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    /// The transport failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body did not have the expected shape
    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),

    /// Background work needs a tokio runtime and none is running
    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    /// A spawned request task ended without reporting a result
    #[error("Task terminated unexpectedly: {0}")]
    TaskTerminated(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScaffoldError {
    /// Whether this error comes from resolving names rather than from I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScaffoldError::ModelNotFound(_)
                | ScaffoldError::ScaffoldNotRegistered(_)
                | ScaffoldError::InvalidConfig(_)
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ScaffoldError::Status { status, .. } => Some(*status),
            ScaffoldError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
