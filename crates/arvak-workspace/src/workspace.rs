//! Workspace, provider and target types.
//!
//! A [`WorkspaceConnection`] is identified by its ARM resource id
//! (`/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Quantum/Workspaces/{name}`).
//! Its `providers` and `jobs` are only ever replaced as a whole from a
//! [`WorkspaceSnapshot`]; they are never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::job::Job;

/// Provider-qualified target ids that accept QIR submissions.
const QIR_TARGET_PREFIXES: &[&str] = &["ionq.", "quantinuum.", "rigetti."];

/// Target that accepts QIR without a provider prefix.
const QIR_ESTIMATOR_TARGET: &str = "microsoft.estimator";

/// Provider-qualified target ids that accept the adaptive QIR profile.
const ADAPTIVE_TARGET_PREFIXES: &[&str] = &["quantinuum."];

/// QIR profile a program must be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetProfile {
    /// Straight-line programs, measurements at the end.
    Base,
    /// Mid-circuit measurement and classical feedback.
    Adaptive,
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetProfile::Base => write!(f, "base"),
            TargetProfile::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// A hardware or simulator backend offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Target id, e.g. `quantinuum.sim.h1-1e`.
    pub id: String,
    /// Availability as reported by the provider.
    #[serde(default)]
    pub current_availability: Option<String>,
    /// Average queue time in seconds.
    #[serde(default)]
    pub average_queue_time: Option<f64>,
}

impl Target {
    /// Create a target with no availability information.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_availability: None,
            average_queue_time: None,
        }
    }

    /// Whether this target accepts QIR programs.
    pub fn supports_qir(&self) -> bool {
        self.id == QIR_ESTIMATOR_TARGET
            || QIR_TARGET_PREFIXES.iter().any(|p| self.id.starts_with(p))
    }

    /// Whether this target accepts the adaptive profile.
    pub fn supports_adaptive(&self) -> bool {
        ADAPTIVE_TARGET_PREFIXES
            .iter()
            .any(|p| self.id.starts_with(p))
    }

    /// Most capable profile this target accepts.
    pub fn profile(&self) -> TargetProfile {
        if self.supports_adaptive() {
            TargetProfile::Adaptive
        } else {
            TargetProfile::Base
        }
    }
}

/// A vendor within a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Provider id, e.g. `ionq`.
    pub id: String,
    #[serde(default)]
    pub current_availability: Option<String>,
    /// Targets offered by the provider.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Provider {
    /// Create a provider with the given targets.
    pub fn new(id: impl Into<String>, targets: Vec<Target>) -> Self {
        Self {
            id: id.into(),
            current_availability: None,
            targets,
        }
    }

    /// Look up a target by id.
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }
}

/// Everything one fetch returns about a workspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceSnapshot {
    pub providers: Vec<Provider>,
    pub jobs: Vec<Job>,
}

impl WorkspaceSnapshot {
    /// Create a snapshot.
    pub fn new(providers: Vec<Provider>, jobs: Vec<Job>) -> Self {
        Self { providers, jobs }
    }

    /// Ids of jobs that have not reached a terminal state.
    pub fn pending_job_ids(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|j| j.status.is_pending())
            .map(|j| j.id.as_str())
            .collect()
    }

    /// Whether any job is still pending.
    pub fn has_pending_jobs(&self) -> bool {
        self.jobs.iter().any(|j| j.status.is_pending())
    }

    /// Look up a job by id.
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

/// A connection to one remote workspace.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConnection {
    /// ARM resource id; identity key.
    pub id: String,
    /// Workspace display name.
    pub name: String,
    /// Regional service root (`https://{location}.quantum.azure.com`).
    pub endpoint_uri: String,
    /// Directory tenant used for token acquisition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Workspace access key, when connecting by connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub providers: Vec<Provider>,
    #[serde(skip)]
    pub jobs: Vec<Job>,
}

impl fmt::Debug for WorkspaceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint_uri", &self.endpoint_uri)
            .field("tenant_id", &self.tenant_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("providers", &self.providers.len())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl WorkspaceConnection {
    /// Create a connection with an empty snapshot.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint_uri: endpoint_uri.into().trim_end_matches('/').to_string(),
            tenant_id: None,
            api_key: None,
            providers: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Set the tenant id.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the access key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace providers and jobs wholesale with a fetched snapshot.
    pub fn with_snapshot(mut self, snapshot: WorkspaceSnapshot) -> Self {
        self.providers = snapshot.providers;
        self.jobs = snapshot.jobs;
        self
    }

    /// Copy of this connection without providers or jobs, as persisted.
    pub fn persisted(&self) -> Self {
        Self {
            providers: Vec::new(),
            jobs: Vec::new(),
            ..self.clone()
        }
    }

    /// Base URL for workspace-scoped API calls.
    pub fn workspace_url(&self) -> String {
        format!("{}{}", self.endpoint_uri, self.id)
    }

    /// Look up a provider by id.
    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Look up a job by id.
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Whether any job is still pending.
    pub fn has_pending_jobs(&self) -> bool {
        self.jobs.iter().any(|j| j.status.is_pending())
    }

    /// Parse a workspace connection string.
    ///
    /// Format: `SubscriptionId=…;ResourceGroupName=…;WorkspaceName=…;ApiKey=…;QuantumEndpoint=…`.
    /// Keys are case-insensitive and may appear in any order.
    pub fn from_connection_string(s: &str) -> WorkspaceResult<Self> {
        let mut subscription = None;
        let mut resource_group = None;
        let mut workspace = None;
        let mut api_key = None;
        let mut endpoint = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                WorkspaceError::InvalidConnectionString(format!("expected key=value, got '{part}'"))
            })?;
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "subscriptionid" => subscription = Some(value),
                "resourcegroupname" => resource_group = Some(value),
                "workspacename" => workspace = Some(value),
                "apikey" => api_key = Some(value),
                "quantumendpoint" => endpoint = Some(value),
                other => tracing::debug!("Ignoring connection string key '{}'", other),
            }
        }

        let require = |v: Option<String>, key: &str| {
            v.filter(|s| !s.is_empty()).ok_or_else(|| {
                WorkspaceError::InvalidConnectionString(format!("missing {key}"))
            })
        };
        let subscription = require(subscription, "SubscriptionId")?;
        let resource_group = require(resource_group, "ResourceGroupName")?;
        let workspace = require(workspace, "WorkspaceName")?;
        let api_key = require(api_key, "ApiKey")?;
        let endpoint = require(endpoint, "QuantumEndpoint")?;

        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(WorkspaceError::InvalidConnectionString(format!(
                "QuantumEndpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }

        let id = format!(
            "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Quantum/Workspaces/{workspace}"
        );

        Ok(Self::new(id, workspace, endpoint).with_api_key(api_key))
    }
}
