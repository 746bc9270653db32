//! Error types for workspace operations.

use thiserror::Error;

/// Errors that can occur while talking to a workspace or managing local state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkspaceError {
    /// Network-level failure (connection refused, DNS, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials were rejected or could not be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote service answered with an error status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A workspace, job or blob does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The program payload could not be generated for the selected target.
    #[error("Program generation failed: {0}")]
    ProgramGeneration(String),

    /// The selected target cannot run the submitted program.
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    /// A connection string is missing fields or malformed.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// A job's output URI does not name a container and blob.
    #[error("Invalid output data URI: {0}")]
    InvalidOutputUri(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credential store or persisted list could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl WorkspaceError {
    /// Whether a later retry may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkspaceError::Network(_) => true,
            WorkspaceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
