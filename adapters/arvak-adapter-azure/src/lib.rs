//! Arvak Adapter for Azure Quantum Workspaces
//!
//! This crate implements [`RemoteApiClient`] against the Azure Quantum
//! workspace REST API, so an `arvak-workspace` registry can track the
//! providers, targets, and jobs of real workspaces.
//!
//! # Authentication
//!
//! | Workspace added via | Header |
//! |---------------------|--------|
//! | Connection string (carries an access key) | `x-ms-quantum-api-key` |
//! | Resource id + endpoint | `Authorization: Bearer` from a [`TokenProvider`] |
//!
//! The default token provider reads `AZURE_QUANTUM_TOKEN`:
//!
//! ```bash
//! export AZURE_QUANTUM_TOKEN="$(az account get-access-token \
//!     --resource https://quantum.microsoft.com --query accessToken -o tsv)"
//! ```
//!
//! # Job submission
//!
//! Submitting a job takes four requests: a SAS URI for the job container,
//! container creation, the payload upload as block blob `inputData`, and
//! the job creation itself. None of them is retried here.
//!
//! # Example
//!
//! ```ignore
//! use arvak_adapter_azure::AzureQuantumClient;
//! use arvak_workspace::{RemoteApiClient, WorkspaceConnection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AzureQuantumClient::new()?;
//!     let ws = WorkspaceConnection::from_connection_string(&std::env::var("AZURE_QUANTUM_CONNECTION_STRING")?)?;
//!
//!     let snapshot = client.list_workspace_snapshot(&ws).await?;
//!     for job in &snapshot.jobs {
//!         println!("{} {}", job.id, job.status);
//!     }
//!     Ok(())
//! }
//! ```

mod api;
mod auth;
mod error;

use arvak_workspace::{
    JobSubmission, RemoteApiClient, WorkspaceConnection, WorkspaceResult, WorkspaceSnapshot,
};
use async_trait::async_trait;
use tracing::info;

pub use api::{AzureQuantumClient, INPUT_BLOB_NAME};
pub use auth::{EnvTokenProvider, StaticTokenProvider, TOKEN_ENV_VAR, TokenProvider};
pub use error::{AzureError, AzureResult};

#[async_trait]
impl RemoteApiClient for AzureQuantumClient {
    async fn list_workspace_snapshot(
        &self,
        workspace: &WorkspaceConnection,
    ) -> WorkspaceResult<WorkspaceSnapshot> {
        let (providers, jobs) =
            tokio::try_join!(self.list_providers(workspace), self.list_jobs(workspace))?;
        Ok(WorkspaceSnapshot::new(providers, jobs))
    }

    async fn submit_job(
        &self,
        workspace: &WorkspaceConnection,
        submission: &JobSubmission,
    ) -> WorkspaceResult<String> {
        let container = submission.container_name();
        let container_uri = self.sas_uri(workspace, &container, None).await?;
        self.create_container(&container_uri).await?;

        let input_uri = self
            .upload_blob(&container_uri, INPUT_BLOB_NAME, submission.payload.clone())
            .await?;
        let job = self
            .create_job(workspace, submission, container_uri, input_uri)
            .await?;

        info!(
            "Created job {} on {} ({})",
            job.id, submission.target_id, job.status
        );
        Ok(job.id)
    }

    async fn fetch_result_blob(
        &self,
        workspace: &WorkspaceConnection,
        container: &str,
        blob: &str,
    ) -> WorkspaceResult<Vec<u8>> {
        let uri = self.sas_uri(workspace, container, Some(blob)).await?;
        Ok(self.download(&uri).await?)
    }
}
