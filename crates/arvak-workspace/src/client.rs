//! Remote API client interface.
//!
//! The core never talks HTTP itself. Everything remote goes through
//! [`RemoteApiClient`], which adapters implement for a concrete service.
//! Implementations MUST NOT retry internally; the refresh cycle owns the
//! retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::workspace::{WorkspaceConnection, WorkspaceSnapshot};

/// Input format tag for QIR bitcode payloads.
pub const QIR_INPUT_FORMAT: &str = "qir.v1";

/// Output format tag for histogram results.
pub const RESULTS_OUTPUT_FORMAT: &str = "microsoft.quantum-results.v1";

/// Default entry point name for generated QIR.
pub const DEFAULT_ENTRY_POINT: &str = "ENTRYPOINT__main";

/// Operations the core needs from a remote workspace service.
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    /// Fetch the full provider/target/job snapshot of a workspace.
    async fn list_workspace_snapshot(
        &self,
        workspace: &WorkspaceConnection,
    ) -> WorkspaceResult<WorkspaceSnapshot>;

    /// Submit a job and return its id.
    async fn submit_job(
        &self,
        workspace: &WorkspaceConnection,
        submission: &JobSubmission,
    ) -> WorkspaceResult<String>;

    /// Download a result blob.
    async fn fetch_result_blob(
        &self,
        workspace: &WorkspaceConnection,
        container: &str,
        blob: &str,
    ) -> WorkspaceResult<Vec<u8>>;
}

/// Everything needed to create a job on a target.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Client-chosen job id.
    pub job_id: String,
    /// Display name.
    pub name: String,
    pub provider_id: String,
    pub target_id: String,
    /// Opaque program payload.
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub input_format: String,
    pub output_format: String,
    pub entry_point: String,
    pub shots: u32,
    /// Extra provider-specific input parameters.
    #[serde(default)]
    pub input_params: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for JobSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSubmission")
            .field("job_id", &self.job_id)
            .field("name", &self.name)
            .field("provider_id", &self.provider_id)
            .field("target_id", &self.target_id)
            .field("payload_bytes", &self.payload.len())
            .field("input_format", &self.input_format)
            .field("shots", &self.shots)
            .finish_non_exhaustive()
    }
}

impl JobSubmission {
    /// Create a QIR submission with a fresh job id.
    pub fn new(
        name: impl Into<String>,
        provider_id: impl Into<String>,
        target_id: impl Into<String>,
        payload: Vec<u8>,
        shots: u32,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            provider_id: provider_id.into(),
            target_id: target_id.into(),
            payload,
            input_format: QIR_INPUT_FORMAT.to_string(),
            output_format: RESULTS_OUTPUT_FORMAT.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            shots,
            input_params: serde_json::Map::new(),
        }
    }

    /// Set the entry point.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Add a provider-specific input parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.input_params.insert(key.into(), value);
        self
    }

    /// Storage container the payload and results live in.
    pub fn container_name(&self) -> String {
        format!("job-{}", self.job_id)
    }
}

/// Container and blob named by a storage URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub container: String,
    pub blob: String,
}

impl BlobLocation {
    /// Split `https://{account}/{container}/{blob…}?{sas}` into its parts.
    pub fn from_uri(uri: &str) -> WorkspaceResult<Self> {
        let invalid = || WorkspaceError::InvalidOutputUri(uri.to_string());

        let rest = uri
            .strip_prefix("https://")
            .or_else(|| uri.strip_prefix("http://"))
            .ok_or_else(invalid)?;
        let path = rest.split(['?', '#']).next().unwrap_or_default();
        let (_host, path) = path.split_once('/').ok_or_else(invalid)?;
        let (container, blob) = path.split_once('/').ok_or_else(invalid)?;

        if container.is_empty() || blob.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            container: container.to_string(),
            blob: blob.to_string(),
        })
    }
}
