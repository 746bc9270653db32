//! Shared fixtures: a scripted in-memory remote client.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use arvak_workspace::{
    Job, JobStatus, JobSubmission, MemoryCredentialStore, Provider, RefreshConfig,
    RemoteApiClient, Target, WorkspaceConnection, WorkspaceError, WorkspaceRegistry,
    WorkspaceResult, WorkspaceService, WorkspaceSnapshot,
};

/// One scripted answer to `list_workspace_snapshot`.
#[derive(Clone)]
pub enum Step {
    /// Return the snapshot immediately.
    Snapshot(WorkspaceSnapshot),
    /// Return the snapshot after a delay.
    Delayed(Duration, WorkspaceSnapshot),
    /// Fail with a network error.
    Fail(String),
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, VecDeque<Step>>,
    calls: HashMap<String, u32>,
    submissions: Vec<JobSubmission>,
    submit_id: Option<String>,
    blobs: HashMap<(String, String), Vec<u8>>,
}

/// Remote client answering from per-workspace scripts.
///
/// Steps are consumed in order; the last one repeats forever.
#[derive(Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, workspace_id: &str, steps: Vec<Step>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(workspace_id.to_string(), steps.into());
    }

    pub fn calls(&self, workspace_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(workspace_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Make `submit_job` return this id instead of the submission's own.
    pub fn set_submit_id(&self, id: &str) {
        self.state.lock().unwrap().submit_id = Some(id.to_string());
    }

    pub fn add_blob(&self, container: &str, blob: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .blobs
            .insert((container.to_string(), blob.to_string()), bytes.to_vec());
    }

    fn next_step(&self, workspace_id: &str) -> Option<Step> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(workspace_id.to_string()).or_insert(0) += 1;
        let script = state.scripts.get_mut(workspace_id)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl RemoteApiClient for MockClient {
    async fn list_workspace_snapshot(
        &self,
        workspace: &WorkspaceConnection,
    ) -> WorkspaceResult<WorkspaceSnapshot> {
        match self.next_step(&workspace.id) {
            Some(Step::Snapshot(snapshot)) => Ok(snapshot),
            Some(Step::Delayed(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            Some(Step::Fail(message)) => Err(WorkspaceError::Network(message)),
            None => Err(WorkspaceError::NotFound(workspace.id.clone())),
        }
    }

    async fn submit_job(
        &self,
        _workspace: &WorkspaceConnection,
        submission: &JobSubmission,
    ) -> WorkspaceResult<String> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(submission.clone());
        Ok(state
            .submit_id
            .clone()
            .unwrap_or_else(|| submission.job_id.clone()))
    }

    async fn fetch_result_blob(
        &self,
        _workspace: &WorkspaceConnection,
        container: &str,
        blob: &str,
    ) -> WorkspaceResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .blobs
            .get(&(container.to_string(), blob.to_string()))
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound(format!("{container}/{blob}")))
    }
}

pub fn workspace(id: &str) -> WorkspaceConnection {
    WorkspaceConnection::new(
        id,
        id.rsplit('/').next().unwrap_or(id),
        "https://eastus.quantum.azure.com",
    )
    .with_api_key("test-key")
}

pub fn providers() -> Vec<Provider> {
    vec![
        Provider::new("ionq", vec![Target::new("ionq.simulator")]),
        Provider::new("quantinuum", vec![Target::new("quantinuum.sim.h1-1e")]),
        Provider::new(
            "microsoft-qc",
            vec![Target::new("microsoft.paralleltempering.cpu")],
        ),
    ]
}

/// Snapshot with the standard providers and the given jobs.
pub fn snapshot(jobs: &[(&str, JobStatus)]) -> WorkspaceSnapshot {
    let jobs = jobs
        .iter()
        .map(|(id, status)| {
            let job = Job::new(*id, status.clone()).with_target("ionq.simulator");
            if status.is_success() {
                job.with_output_uri(format!(
                    "https://acct.blob.core.windows.net/job-{id}/rawOutputData?sig=x"
                ))
            } else {
                job
            }
        })
        .collect();
    WorkspaceSnapshot::new(providers(), jobs)
}

pub fn service(client: &Arc<MockClient>) -> WorkspaceService {
    service_with_store(client, Arc::new(MemoryCredentialStore::new()))
}

pub fn service_with_store(
    client: &Arc<MockClient>,
    store: Arc<MemoryCredentialStore>,
) -> WorkspaceService {
    WorkspaceService::new(
        WorkspaceRegistry::new(),
        client.clone(),
        store,
        RefreshConfig::default(),
    )
}

/// Wait until the client has served `n` fetches for a workspace.
pub async fn wait_for_calls(client: &MockClient, workspace_id: &str, n: u32) {
    while client.calls(workspace_id) < n {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn job_status(registry: &WorkspaceRegistry, workspace_id: &str, job_id: &str) -> Option<JobStatus> {
    registry
        .get(workspace_id)?
        .job(job_id)
        .map(|j| j.status.clone())
}
