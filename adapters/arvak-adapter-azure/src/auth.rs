//! Credentials for Azure Quantum requests.
//!
//! Workspaces added from a connection string carry an access key, sent as
//! `x-ms-quantum-api-key`. All others authenticate with a bearer token from a
//! [`TokenProvider`].

use std::fmt;

use async_trait::async_trait;
use arvak_workspace::WorkspaceConnection;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

use crate::error::{AzureError, AzureResult};

/// Default environment variable holding a bearer token.
pub const TOKEN_ENV_VAR: &str = "AZURE_QUANTUM_TOKEN";

/// Header carrying a workspace access key.
pub const API_KEY_HEADER: &str = "x-ms-quantum-api-key";

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a token valid for the given workspace.
    async fn get_token(&self, workspace: &WorkspaceConnection) -> AzureResult<String>;
}

/// Reads the token from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    env_var: String,
}

impl EnvTokenProvider {
    /// Create a provider reading `env_var`.
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self, _workspace: &WorkspaceConnection) -> AzureResult<String> {
        std::env::var(&self.env_var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AzureError::MissingToken(self.env_var.clone()))
    }
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _workspace: &WorkspaceConnection) -> AzureResult<String> {
        Ok(self.token.clone())
    }
}

/// Header that authenticates a request for `workspace`.
pub(crate) async fn auth_header(
    workspace: &WorkspaceConnection,
    tokens: &dyn TokenProvider,
) -> AzureResult<(HeaderName, HeaderValue)> {
    let (name, value) = match workspace.api_key.as_deref() {
        Some(key) => (HeaderName::from_static(API_KEY_HEADER), key.to_string()),
        None => (
            AUTHORIZATION,
            format!("Bearer {}", tokens.get_token(workspace).await?),
        ),
    };
    let mut value = HeaderValue::from_str(&value).map_err(|_| {
        AzureError::InvalidCredential(format!("{} contains invalid characters", name.as_str()))
    })?;
    value.set_sensitive(true);
    Ok((name, value))
}
