//! Error types for the Azure Quantum adapter.

use arvak_workspace::WorkspaceError;
use thiserror::Error;

/// Result type for Azure Quantum operations.
pub type AzureResult<T> = Result<T, AzureError>;

/// Errors that can occur when talking to Azure Quantum.
#[derive(Debug, Error)]
pub enum AzureError {
    /// No bearer token available.
    #[error("Azure Quantum access token not found. Set the {0} environment variable.")]
    MissingToken(String),

    /// Token or api key cannot be used as a header value.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials were rejected (401/403).
    #[error("Azure Quantum rejected the credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Resource does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service answered with any other error status.
    #[error("Azure Quantum API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A paged listing could not be followed to its end.
    #[error("Incomplete listing: {0}")]
    Pagination(String),

    /// Response body could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AzureError {
    /// Classify an error response.
    pub fn from_status(status: u16, url: &str, body: String) -> Self {
        match status {
            401 | 403 => AzureError::Unauthorized {
                status,
                message: body,
            },
            404 => AzureError::NotFound(url.to_string()),
            _ => AzureError::Api {
                status,
                message: body,
            },
        }
    }
}

impl From<AzureError> for WorkspaceError {
    fn from(e: AzureError) -> Self {
        match e {
            AzureError::MissingToken(_)
            | AzureError::InvalidCredential(_)
            | AzureError::Unauthorized { .. } => WorkspaceError::Authentication(e.to_string()),
            AzureError::Http(err) => WorkspaceError::Network(err.to_string()),
            AzureError::NotFound(what) => WorkspaceError::NotFound(what),
            AzureError::Api { status, message } => WorkspaceError::Api { status, message },
            AzureError::Pagination(_) => WorkspaceError::Api {
                status: 502,
                message: e.to_string(),
            },
            AzureError::Json(err) => WorkspaceError::Serialization(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_display() {
        let err = AzureError::MissingToken("AZURE_QUANTUM_TOKEN".into());
        assert!(err.to_string().contains("AZURE_QUANTUM_TOKEN"));
    }

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            AzureError::from_status(401, "u", "expired".into()),
            AzureError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            AzureError::from_status(403, "u", String::new()),
            AzureError::Unauthorized { status: 403, .. }
        ));
        assert!(matches!(
            AzureError::from_status(404, "https://x/jobs/1", String::new()),
            AzureError::NotFound(url) if url == "https://x/jobs/1"
        ));
        assert!(matches!(
            AzureError::from_status(503, "u", "busy".into()),
            AzureError::Api { status: 503, .. }
        ));
    }

    #[test]
    fn test_unauthorized_to_workspace_auth() {
        let ws: WorkspaceError = AzureError::Unauthorized {
            status: 401,
            message: "bad key".into(),
        }
        .into();
        assert!(matches!(ws, WorkspaceError::Authentication(msg) if msg.contains("bad key")));
    }

    #[test]
    fn test_missing_token_to_workspace_auth() {
        let ws: WorkspaceError = AzureError::MissingToken("T".into()).into();
        assert!(matches!(ws, WorkspaceError::Authentication(_)));
    }

    #[test]
    fn test_api_error_keeps_status() {
        let ws: WorkspaceError = AzureError::Api {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert!(ws.is_transient());
        assert!(matches!(ws, WorkspaceError::Api { status: 429, .. }));
    }

    #[test]
    fn test_not_found_to_workspace() {
        let ws: WorkspaceError = AzureError::NotFound("blob".into()).into();
        assert!(matches!(ws, WorkspaceError::NotFound(what) if what == "blob"));
    }

    #[test]
    fn test_pagination_is_retryable_api_error() {
        let ws: WorkspaceError = AzureError::Pagination("listing exceeds 1000 pages".into()).into();
        assert!(ws.is_transient());
        assert!(matches!(ws, WorkspaceError::Api { status: 502, message } if message.contains("1000 pages")));
    }

    #[test]
    fn test_json_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let ws: WorkspaceError = AzureError::Json(json_err).into();
        assert!(matches!(ws, WorkspaceError::Serialization(_)));
    }
}
