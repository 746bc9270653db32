//! Refresh cycles.
//!
//! A refresh cycle polls one workspace until nothing is pending:
//!
//! ```text
//!   start(id) ──→ fetch ──→ upsert ──→ pending? ──yes──→ sleep(backoff) ──┐
//!                   ▲                     │                               │
//!                   │                     no                              │
//!                   │                     ▼                               │
//!                   │                  Settled                            │
//!                   └─────────────────────────────────────────────────────┘
//! ```
//!
//! Only one cycle per workspace id is live. Starting a new cycle bumps the
//! id's generation counter; an older cycle notices on its next check and
//! exits without writing its (possibly stale) snapshot. The generation check
//! and the registry write happen under the same lock, so a superseded cycle
//! can never overwrite a newer one.
//!
//! Fetch failures are logged and retried at the next backoff step. A cycle
//! ends only when it settles, its workspace is removed, or it is superseded.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::RemoteApiClient;
use crate::job::JobStatus;
use crate::registry::WorkspaceRegistry;
use crate::workspace::{WorkspaceConnection, WorkspaceSnapshot};

/// Lower bound for the interval between two fetches.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polling schedule for refresh cycles.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Delay after the first tick, and after any tick that observed a change.
    pub initial_interval: Duration,
    /// Upper bound for the delay.
    pub max_interval: Duration,
    /// Multiplier applied to the delay after each unchanged or failed tick.
    pub backoff_factor: f64,
    /// Ticks to wait for a freshly submitted job to show up in the job list.
    pub missing_job_grace_ticks: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_factor: 2.0,
            missing_job_grace_ticks: 10,
        }
    }
}

impl RefreshConfig {
    /// Initial interval, never below [`MIN_INTERVAL`].
    pub fn first_interval(&self) -> Duration {
        self.initial_interval.max(MIN_INTERVAL)
    }

    /// Interval following `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.first_interval());
        let factor = if self.backoff_factor.is_finite() {
            self.backoff_factor.max(1.0)
        } else {
            1.0
        };
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .unwrap_or(cap)
            .clamp(self.first_interval(), cap)
    }
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No job is pending any more.
    Settled {
        /// Number of fetches performed, including failed ones.
        ticks: u32,
    },
    /// A newer cycle for the same workspace took over.
    Superseded,
    /// The workspace was removed from the registry.
    WorkspaceRemoved,
}

/// Handle to a running refresh cycle.
///
/// Dropping the handle leaves the cycle running.
#[derive(Debug)]
pub struct RefreshHandle {
    workspace_id: String,
    generation: u64,
    task: JoinHandle<RefreshOutcome>,
}

impl RefreshHandle {
    /// Workspace the cycle refreshes.
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Generation this cycle was started with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the cycle to end. `None` if the task was aborted or panicked.
    pub async fn outcome(self) -> Option<RefreshOutcome> {
        self.task.await.ok()
    }
}

struct Inner {
    registry: WorkspaceRegistry,
    client: Arc<dyn RemoteApiClient>,
    config: RefreshConfig,
    generations: Mutex<FxHashMap<String, u64>>,
}

impl Inner {
    fn generation_of(&self, id: &str) -> Option<u64> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    /// Current connection, unless this cycle should stop.
    fn current(&self, id: &str, generation: u64) -> Result<WorkspaceConnection, RefreshOutcome> {
        if self.generation_of(id) != Some(generation) {
            return Err(RefreshOutcome::Superseded);
        }
        self.registry
            .get(id)
            .ok_or(RefreshOutcome::WorkspaceRemoved)
    }

    /// Write a snapshot if this cycle is still the live one.
    fn commit(
        &self,
        id: &str,
        generation: u64,
        snapshot: WorkspaceSnapshot,
    ) -> Result<(), RefreshOutcome> {
        let generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generations.get(id).copied() != Some(generation) {
            return Err(RefreshOutcome::Superseded);
        }
        if self.registry.upsert_snapshot(id, snapshot) {
            Ok(())
        } else {
            Err(RefreshOutcome::WorkspaceRemoved)
        }
    }
}

/// Starts and supersedes refresh cycles.
///
/// Cloning yields a handle to the same generation table.
#[derive(Clone)]
pub struct RefreshManager {
    inner: Arc<Inner>,
}

impl RefreshManager {
    /// Create a manager that writes into `registry` using `client`.
    pub fn new(
        registry: WorkspaceRegistry,
        client: Arc<dyn RemoteApiClient>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                client,
                config,
                generations: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// The polling schedule.
    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    /// Start a refresh cycle for `workspace_id`, superseding any running one.
    ///
    /// `prioritized_job` keeps the cycle alive until that job has appeared
    /// and reached a terminal state (used right after a submission, when the
    /// job list may not contain the new job yet).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, workspace_id: &str, prioritized_job: Option<String>) -> RefreshHandle {
        let generation = self.bump(workspace_id);
        debug!(
            "Starting refresh cycle {} for {} (prioritized: {:?})",
            generation, workspace_id, prioritized_job
        );

        let inner = Arc::clone(&self.inner);
        let id = workspace_id.to_string();
        let task = tokio::spawn(run_cycle(inner, id, generation, prioritized_job));

        RefreshHandle {
            workspace_id: workspace_id.to_string(),
            generation,
            task,
        }
    }

    /// Current generation for a workspace, if a cycle was ever started.
    pub fn generation(&self, workspace_id: &str) -> Option<u64> {
        self.inner.generation_of(workspace_id)
    }

    /// Stop any running cycle for a workspace without starting a new one.
    ///
    /// The counter is bumped rather than dropped so generations stay
    /// monotonic if the workspace is added again later.
    pub fn forget(&self, workspace_id: &str) {
        let generation = self.bump(workspace_id);
        debug!("Retired refresh generation {} for {}", generation, workspace_id);
    }

    fn bump(&self, workspace_id: &str) -> u64 {
        let mut generations = self
            .inner
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = generations.entry(workspace_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }
}

/// Ids and statuses of a snapshot's jobs, used to detect changes.
fn job_fingerprint(snapshot: &WorkspaceSnapshot) -> Vec<(String, JobStatus)> {
    let mut fingerprint: Vec<_> = snapshot
        .jobs
        .iter()
        .map(|j| (j.id.clone(), j.status.clone()))
        .collect();
    fingerprint.sort_by(|a, b| a.0.cmp(&b.0));
    fingerprint
}

/// Tracks the job a cycle was started for.
struct Priority {
    job_id: Option<String>,
    missing_ticks: u32,
    grace_ticks: u32,
}

impl Priority {
    /// Whether the prioritized job still needs polling after `snapshot`.
    fn still_pending(&mut self, workspace_id: &str, snapshot: &WorkspaceSnapshot) -> bool {
        let Some(job_id) = self.job_id.as_deref() else {
            return false;
        };
        match snapshot.job(job_id) {
            Some(job) => {
                let pending = job.status.is_pending();
                if !pending {
                    info!("Job {} in {} finished: {}", job_id, workspace_id, job.status);
                    self.job_id = None;
                }
                pending
            }
            None => {
                self.missing_ticks += 1;
                if self.missing_ticks > self.grace_ticks {
                    warn!(
                        "Job {} never appeared in {} after {} refreshes, no longer waiting for it",
                        job_id, workspace_id, self.grace_ticks
                    );
                    self.job_id = None;
                    false
                } else {
                    true
                }
            }
        }
    }
}

async fn run_cycle(
    inner: Arc<Inner>,
    id: String,
    generation: u64,
    prioritized_job: Option<String>,
) -> RefreshOutcome {
    let mut priority = Priority {
        job_id: prioritized_job,
        missing_ticks: 0,
        grace_ticks: inner.config.missing_job_grace_ticks,
    };
    let mut delay = inner.config.first_interval();
    let mut last_fingerprint: Option<Vec<(String, JobStatus)>> = None;
    let mut ticks = 0u32;

    loop {
        let workspace = match inner.current(&id, generation) {
            Ok(ws) => ws,
            Err(outcome) => {
                debug!("Refresh cycle {} for {} ended: {:?}", generation, id, outcome);
                return outcome;
            }
        };

        ticks = ticks.saturating_add(1);
        match inner.client.list_workspace_snapshot(&workspace).await {
            Ok(snapshot) => {
                debug!(
                    "Refresh {} of {}: pending {:?}",
                    ticks,
                    id,
                    snapshot.pending_job_ids()
                );
                let fingerprint = job_fingerprint(&snapshot);
                let jobs_pending = snapshot.has_pending_jobs();
                let priority_pending = priority.still_pending(&id, &snapshot);

                if let Err(outcome) = inner.commit(&id, generation, snapshot) {
                    debug!("Refresh cycle {} for {} ended: {:?}", generation, id, outcome);
                    return outcome;
                }

                if !jobs_pending && !priority_pending {
                    info!("Workspace {} settled after {} refresh(es)", id, ticks);
                    return RefreshOutcome::Settled { ticks };
                }

                if last_fingerprint.as_ref() != Some(&fingerprint) {
                    delay = inner.config.first_interval();
                }
                last_fingerprint = Some(fingerprint);
            }
            Err(e) => {
                let kind = if e.is_transient() { "transient" } else { "persistent" };
                warn!(
                    "Refresh of {} failed ({}), retrying in {:?}: {}",
                    id, kind, delay, e
                );
            }
        }

        tokio::time::sleep(delay).await;
        delay = inner.config.next_interval(delay);
    }
}
