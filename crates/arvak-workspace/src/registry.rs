//! Workspace registry.
//!
//! The [`WorkspaceRegistry`] is the in-process cache of every known
//! [`WorkspaceConnection`]. All mutation goes through [`upsert`] and
//! [`remove`], both of which replace whole entries, so readers always see a
//! complete snapshot. Every mutation is announced on a broadcast channel.
//!
//! [`upsert`]: WorkspaceRegistry::upsert
//! [`remove`]: WorkspaceRegistry::remove

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::workspace::{WorkspaceConnection, WorkspaceSnapshot};

/// Capacity of the change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification emitted on every registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A workspace was inserted or its snapshot replaced.
    Upserted(String),
    /// A workspace was removed.
    Removed(String),
}

impl RegistryEvent {
    /// Id of the workspace this event concerns.
    pub fn workspace_id(&self) -> &str {
        match self {
            RegistryEvent::Upserted(id) | RegistryEvent::Removed(id) => id,
        }
    }
}

/// Shared registry of workspace connections.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct WorkspaceRegistry {
    workspaces: Arc<RwLock<FxHashMap<String, WorkspaceConnection>>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl WorkspaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            workspaces: Arc::new(RwLock::new(FxHashMap::default())),
            events,
        }
    }

    /// Insert or replace a workspace by id.
    pub fn upsert(&self, workspace: WorkspaceConnection) {
        let id = workspace.id.clone();
        {
            let mut map = self
                .workspaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            map.insert(id.clone(), workspace);
        }
        debug!("Registry upsert: {}", id);
        self.notify(RegistryEvent::Upserted(id));
    }

    /// Upsert a fetched snapshot into an entry that is still registered.
    ///
    /// The presence check and the replacement happen under one write lock,
    /// so a concurrent [`remove`](Self::remove) is never undone. Returns
    /// `false` without notifying if the workspace is gone.
    pub fn upsert_snapshot(&self, id: &str, snapshot: WorkspaceSnapshot) -> bool {
        let replaced = {
            let mut map = self
                .workspaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match map.remove(id) {
                Some(existing) => {
                    map.insert(id.to_string(), existing.with_snapshot(snapshot));
                    true
                }
                None => false,
            }
        };
        if replaced {
            debug!("Registry snapshot upsert: {}", id);
            self.notify(RegistryEvent::Upserted(id.to_string()));
        }
        replaced
    }

    /// Remove a workspace. Removing an unknown id does nothing.
    pub fn remove(&self, id: &str) {
        let removed = {
            let mut map = self
                .workspaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            map.remove(id).is_some()
        };
        if removed {
            debug!("Registry remove: {}", id);
            self.notify(RegistryEvent::Removed(id.to_string()));
        }
    }

    /// Get a copy of a workspace's current snapshot.
    pub fn get(&self, id: &str) -> Option<WorkspaceConnection> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Check whether a workspace is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Known workspace ids, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Copies of all workspaces, sorted by id.
    pub fn snapshot(&self) -> Vec<WorkspaceConnection> {
        let mut all: Vec<_> = self
            .workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of registered workspaces.
    pub fn len(&self) -> usize {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no workspace is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobStatus};
    use crate::workspace::{Provider, Target};
    use proptest::prelude::*;

    fn workspace(id: &str) -> WorkspaceConnection {
        WorkspaceConnection::new(id, id, "https://eastus.quantum.azure.com")
    }

    #[test]
    fn test_empty_registry() {
        let registry = WorkspaceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list_ids().is_empty());
        assert!(registry.get("/w").is_none());
    }

    #[test]
    fn test_upsert_replaces_whole_snapshot() {
        let registry = WorkspaceRegistry::new();
        registry.upsert(workspace("/w").with_snapshot(WorkspaceSnapshot::new(
            vec![Provider::new("ionq", vec![Target::new("ionq.simulator")])],
            vec![
                Job::new("j1", JobStatus::Waiting),
                Job::new("j2", JobStatus::Executing),
            ],
        )));
        registry.upsert(workspace("/w").with_snapshot(WorkspaceSnapshot::new(
            vec![],
            vec![Job::new("j1", JobStatus::Succeeded)],
        )));

        let ws = registry.get("/w").unwrap();
        assert!(ws.providers.is_empty());
        assert_eq!(ws.jobs, vec![Job::new("j1", JobStatus::Succeeded)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = WorkspaceRegistry::new();
        registry.remove("/never-inserted");
        assert!(registry.get("/never-inserted").is_none());

        registry.upsert(workspace("/w"));
        registry.remove("/w");
        registry.remove("/w");
        assert!(registry.get("/w").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_snapshot_keeps_connection_fields() {
        let registry = WorkspaceRegistry::new();
        registry.upsert(workspace("/w").with_api_key("k"));

        let updated = registry.upsert_snapshot(
            "/w",
            WorkspaceSnapshot::new(vec![], vec![Job::new("j1", JobStatus::Executing)]),
        );
        assert!(updated);

        let ws = registry.get("/w").unwrap();
        assert_eq!(ws.api_key.as_deref(), Some("k"));
        assert_eq!(ws.jobs.len(), 1);
    }

    #[test]
    fn test_upsert_snapshot_does_not_resurrect() {
        let registry = WorkspaceRegistry::new();
        registry.upsert(workspace("/w"));
        registry.remove("/w");

        assert!(!registry.upsert_snapshot("/w", WorkspaceSnapshot::default()));
        assert!(registry.get("/w").is_none());
    }

    #[test]
    fn test_list_ids_sorted() {
        let registry = WorkspaceRegistry::new();
        registry.upsert(workspace("/zeta"));
        registry.upsert(workspace("/alpha"));
        assert_eq!(registry.list_ids(), vec!["/alpha", "/zeta"]);
    }

    #[tokio::test]
    async fn test_events() {
        let registry = WorkspaceRegistry::new();
        let mut rx = registry.subscribe();

        registry.upsert(workspace("/w"));
        registry.remove("/w");
        registry.remove("/w");
        registry.upsert(workspace("/v"));

        assert_eq!(rx.recv().await.unwrap(), RegistryEvent::Upserted("/w".into()));
        assert_eq!(rx.recv().await.unwrap(), RegistryEvent::Removed("/w".into()));
        // The second remove was a no-op and emitted nothing.
        assert_eq!(rx.recv().await.unwrap(), RegistryEvent::Upserted("/v".into()));
    }

    #[test]
    fn test_clone_shares_state() {
        let registry = WorkspaceRegistry::new();
        let handle = registry.clone();
        handle.upsert(workspace("/w"));
        assert!(registry.contains("/w"));
    }

    fn arb_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Waiting),
            Just(JobStatus::Executing),
            Just(JobStatus::Succeeded),
            Just(JobStatus::Failed),
            Just(JobStatus::Cancelled),
        ]
    }

    fn arb_upsert() -> impl Strategy<Value = (u8, Vec<(u8, JobStatus)>)> {
        (0u8..4, prop::collection::vec((0u8..6, arb_status()), 0..5))
    }

    proptest! {
        #[test]
        fn prop_get_reflects_last_upsert(ops in prop::collection::vec(arb_upsert(), 1..30)) {
            let registry = WorkspaceRegistry::new();
            let mut expected: FxHashMap<String, Vec<Job>> = FxHashMap::default();

            for (ws, jobs) in &ops {
                let id = format!("/w{ws}");
                let jobs: Vec<Job> = jobs
                    .iter()
                    .map(|(j, s)| Job::new(format!("j{j}"), s.clone()))
                    .collect();
                registry.upsert(
                    workspace(&id).with_snapshot(WorkspaceSnapshot::new(vec![], jobs.clone())),
                );
                expected.insert(id, jobs);
            }

            for (id, jobs) in &expected {
                let got = registry.get(id).unwrap();
                prop_assert_eq!(&got.jobs, jobs);
            }
            prop_assert_eq!(registry.len(), expected.len());
        }
    }
}
