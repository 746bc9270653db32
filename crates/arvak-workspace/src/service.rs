//! Command handlers.
//!
//! [`WorkspaceService`] is the application context: it owns the registry,
//! the remote client, the persisted workspace list and the refresh manager,
//! and turns discrete user actions into calls on them.
//!
//! Handlers that need a particular selection return `Ok(None)` when the
//! selection does not fit (nothing to do, nothing to report). Remote and
//! program-generation failures are returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::client::{BlobLocation, JobSubmission, RemoteApiClient};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::persistence::{CredentialStore, WorkspaceStore};
use crate::refresh::{RefreshConfig, RefreshHandle, RefreshManager};
use crate::registry::WorkspaceRegistry;
use crate::tree::TreeItem;
use crate::workspace::{TargetProfile, WorkspaceConnection};

/// Produces the program payload submitted to a target.
#[async_trait]
pub trait ProgramSource: Send + Sync {
    /// Generate the program for the given profile.
    async fn generate(&self, profile: TargetProfile) -> WorkspaceResult<Vec<u8>>;
}

/// Program already available as bytes (e.g. a QIR bitcode file).
#[derive(Debug, Clone)]
pub struct StaticProgram {
    payload: Vec<u8>,
    profile: TargetProfile,
}

impl StaticProgram {
    /// Wrap a payload generated for `profile`.
    pub fn new(payload: Vec<u8>, profile: TargetProfile) -> Self {
        Self { payload, profile }
    }
}

#[async_trait]
impl ProgramSource for StaticProgram {
    async fn generate(&self, profile: TargetProfile) -> WorkspaceResult<Vec<u8>> {
        // Base programs run everywhere; adaptive ones need an adaptive target.
        if self.profile == TargetProfile::Adaptive && profile == TargetProfile::Base {
            return Err(WorkspaceError::ProgramGeneration(
                "program requires the adaptive profile but the target only supports base".into(),
            ));
        }
        if self.payload.is_empty() {
            return Err(WorkspaceError::ProgramGeneration("program is empty".into()));
        }
        Ok(self.payload.clone())
    }
}

/// User-chosen parameters of a submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub name: String,
    pub shots: u32,
    pub entry_point: Option<String>,
}

impl SubmitRequest {
    /// Create a request.
    pub fn new(name: impl Into<String>, shots: u32) -> Self {
        Self {
            name: name.into(),
            shots,
            entry_point: None,
        }
    }
}

/// A job that was accepted by the service.
#[derive(Debug)]
pub struct SubmittedJob {
    pub job_id: String,
    /// Refresh cycle tracking the new job.
    pub refresh: RefreshHandle,
}

/// Application context for workspace commands.
pub struct WorkspaceService {
    registry: WorkspaceRegistry,
    client: Arc<dyn RemoteApiClient>,
    store: WorkspaceStore,
    refresh: RefreshManager,
}

impl WorkspaceService {
    /// Create a service.
    pub fn new(
        registry: WorkspaceRegistry,
        client: Arc<dyn RemoteApiClient>,
        credentials: Arc<dyn CredentialStore>,
        refresh_config: RefreshConfig,
    ) -> Self {
        let refresh = RefreshManager::new(registry.clone(), Arc::clone(&client), refresh_config);
        Self {
            registry,
            client,
            store: WorkspaceStore::new(credentials),
            refresh,
        }
    }

    /// The registry this service mutates.
    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    /// The refresh manager.
    pub fn refresh_manager(&self) -> &RefreshManager {
        &self.refresh
    }

    /// Register every persisted workspace and start a refresh cycle for each.
    ///
    /// Workspaces appear with empty providers and jobs until their first
    /// refresh lands.
    pub async fn load_persisted(&self) -> WorkspaceResult<Vec<RefreshHandle>> {
        let workspaces = self.store.load().await?;
        info!("Loaded {} persisted workspace(s)", workspaces.len());

        let mut handles = Vec::with_capacity(workspaces.len());
        for ws in workspaces {
            let id = ws.id.clone();
            self.registry.upsert(ws.persisted());
            handles.push(self.refresh.start(&id, None));
        }
        Ok(handles)
    }

    /// Connect a workspace: fetch it once, register it and persist the list.
    ///
    /// Starts a refresh cycle when the workspace already has pending jobs.
    pub async fn add_workspace(
        &self,
        workspace: WorkspaceConnection,
    ) -> WorkspaceResult<Option<RefreshHandle>> {
        let id = workspace.id.clone();
        let pending = self.connect(workspace).await?;
        Ok(pending.then(|| self.refresh.start(&id, None)))
    }

    /// Fetch a workspace once, register it and persist the list, without
    /// starting a refresh cycle.
    ///
    /// Returns whether any job is pending.
    #[instrument(skip_all, fields(workspace_id = %workspace.id))]
    pub async fn connect(&self, workspace: WorkspaceConnection) -> WorkspaceResult<bool> {
        let snapshot = self.client.list_workspace_snapshot(&workspace).await?;
        let pending = snapshot.has_pending_jobs();
        let id = workspace.id.clone();

        self.registry.upsert(workspace.with_snapshot(snapshot));
        self.persist().await?;
        info!("Added workspace {}", id);
        Ok(pending)
    }

    /// Parse a connection string and add the workspace it names.
    pub async fn add_from_connection_string(
        &self,
        connection_string: &str,
    ) -> WorkspaceResult<String> {
        let workspace = WorkspaceConnection::from_connection_string(connection_string)?;
        let id = workspace.id.clone();
        self.add_workspace(workspace).await?;
        Ok(id)
    }

    /// Forget a workspace. Unknown ids are ignored but the list is still
    /// persisted.
    pub async fn remove_workspace(&self, workspace_id: &str) -> WorkspaceResult<()> {
        self.refresh.forget(workspace_id);
        self.registry.remove(workspace_id);
        self.persist().await?;
        info!("Removed workspace {}", workspace_id);
        Ok(())
    }

    /// Start a new refresh cycle, superseding any running one.
    ///
    /// Returns `None` for unknown workspaces.
    pub fn refresh(&self, workspace_id: &str) -> Option<RefreshHandle> {
        self.registry
            .contains(workspace_id)
            .then(|| self.refresh.start(workspace_id, None))
    }

    /// Submit a program to the selected target.
    ///
    /// Returns `Ok(None)` if the selection is not a target of a registered
    /// workspace. Generation failures create no job and start no refresh.
    #[instrument(skip_all, fields(workspace_id = %selection.workspace_id()))]
    pub async fn submit_to_target(
        &self,
        selection: &TreeItem,
        source: &dyn ProgramSource,
        request: SubmitRequest,
    ) -> WorkspaceResult<Option<SubmittedJob>> {
        let TreeItem::Target {
            workspace_id,
            provider_id,
            target,
        } = selection
        else {
            return Ok(None);
        };
        let Some(workspace) = self.registry.get(workspace_id) else {
            return Ok(None);
        };

        if !target.supports_qir() {
            return Err(WorkspaceError::UnsupportedTarget(format!(
                "{} does not accept QIR programs",
                target.id
            )));
        }

        let payload = source.generate(target.profile()).await.map_err(|e| match e {
            WorkspaceError::ProgramGeneration(_) => e,
            other => WorkspaceError::ProgramGeneration(other.to_string()),
        })?;

        let mut submission =
            JobSubmission::new(request.name, provider_id, &target.id, payload, request.shots);
        if let Some(entry_point) = request.entry_point {
            submission = submission.with_entry_point(entry_point);
        }

        let job_id = self.client.submit_job(&workspace, &submission).await?;
        info!("Submitted job {} to {}", job_id, target.id);

        let refresh = self.refresh.start(workspace_id, Some(job_id.clone()));
        Ok(Some(SubmittedJob { job_id, refresh }))
    }

    /// Download the results of the selected job.
    ///
    /// Returns `Ok(None)` unless the selection is a succeeded job with an
    /// output URI.
    pub async fn download_results(&self, selection: &TreeItem) -> WorkspaceResult<Option<Vec<u8>>> {
        let TreeItem::Job { workspace_id, job } = selection else {
            return Ok(None);
        };
        let (Some(uri), true) = (job.output_data_uri.as_deref(), job.status.is_success()) else {
            return Ok(None);
        };
        let Some(workspace) = self.registry.get(workspace_id) else {
            return Ok(None);
        };

        let location = BlobLocation::from_uri(uri)?;
        let bytes = self
            .client
            .fetch_result_blob(&workspace, &location.container, &location.blob)
            .await?;
        info!("Downloaded {} bytes of results for job {}", bytes.len(), job.id);
        Ok(Some(bytes))
    }

    /// Tree node for a target of a registered workspace.
    pub fn target_item(
        &self,
        workspace_id: &str,
        provider_id: &str,
        target_id: &str,
    ) -> Option<TreeItem> {
        let ws = self.registry.get(workspace_id)?;
        let target = ws.provider(provider_id)?.target(target_id)?.clone();
        Some(TreeItem::Target {
            workspace_id: ws.id,
            provider_id: provider_id.to_string(),
            target,
        })
    }

    /// Tree node for a job of a registered workspace.
    pub fn job_item(&self, workspace_id: &str, job_id: &str) -> Option<TreeItem> {
        let ws = self.registry.get(workspace_id)?;
        let job = ws.job(job_id)?.clone();
        Some(TreeItem::Job {
            workspace_id: ws.id,
            job,
        })
    }

    async fn persist(&self) -> WorkspaceResult<()> {
        self.store.save(&self.registry.snapshot()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_program_profiles() {
        let base = StaticProgram::new(vec![1], TargetProfile::Base);
        assert!(base.generate(TargetProfile::Base).await.is_ok());
        assert!(base.generate(TargetProfile::Adaptive).await.is_ok());

        let adaptive = StaticProgram::new(vec![1], TargetProfile::Adaptive);
        assert!(adaptive.generate(TargetProfile::Adaptive).await.is_ok());
        let err = adaptive.generate(TargetProfile::Base).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::ProgramGeneration(_)));
    }

    #[tokio::test]
    async fn test_static_program_empty() {
        let empty = StaticProgram::new(Vec::new(), TargetProfile::Base);
        assert!(empty.generate(TargetProfile::Base).await.is_err());
    }
}
