//! Remote job types.
//!
//! The remote service owns the job state machine; we only observe it:
//!
//! ```text
//!   Waiting ──→ Executing ──→ Finishing ──→ Succeeded
//!      │            │                  └──→ Failed
//!      │            │
//!      └────────────┴──→ CancellationRequested ──→ Cancelled
//! ```
//!
//! Terminal states (`Succeeded`, `Failed`, `Cancelled`) are permanent.
//! Anything the service reports that we do not recognise is kept as
//! [`JobStatus::Unknown`] and treated as still pending, so a new remote state
//! never ends tracking early.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Queued at the provider.
    Waiting,
    /// Running on the target.
    Executing,
    /// Execution done, results are being written.
    Finishing,
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Cancellation requested but not yet confirmed.
    CancellationRequested,
    /// Status string not known to this crate.
    Unknown(String),
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check if the job may still change.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }

    /// Status name as the service spells it.
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Waiting => "Waiting",
            JobStatus::Executing => "Executing",
            JobStatus::Finishing => "Finishing",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::CancellationRequested => "CancellationRequested",
            JobStatus::Unknown(s) => s,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "waiting" | "queued" => JobStatus::Waiting,
            "executing" | "running" => JobStatus::Executing,
            "finishing" => JobStatus::Finishing,
            "succeeded" | "completed" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            "cancellationrequested" | "cancelling" => JobStatus::CancellationRequested,
            _ => JobStatus::Unknown(s.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::from(s.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Unknown(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Service error code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// A job as last reported by the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// The job identifier.
    pub id: String,
    /// Display name given at submission.
    #[serde(default)]
    pub name: Option<String>,
    /// Target the job runs on (e.g. `ionq.simulator`).
    #[serde(default)]
    pub target: Option<String>,
    /// Provider owning the target.
    #[serde(default)]
    pub provider_id: Option<String>,
    /// Current status.
    pub status: JobStatus,
    /// Blob URI holding the results once the job succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_execution_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_execution_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<JobError>,
}

impl Job {
    /// Create a job record with only an id and a status.
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            name: None,
            target: None,
            provider_id: None,
            status,
            output_data_uri: None,
            creation_time: None,
            begin_execution_time: None,
            end_execution_time: None,
            error_data: None,
        }
    }

    /// Set the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the output URI.
    pub fn with_output_uri(mut self, uri: impl Into<String>) -> Self {
        self.output_data_uri = Some(uri.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether results for this job can be downloaded.
    pub fn has_results(&self) -> bool {
        self.status.is_success() && self.output_data_uri.is_some()
    }

    /// Name if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
