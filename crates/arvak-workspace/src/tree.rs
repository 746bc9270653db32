//! Presentation tree over the registry.
//!
//! Every node is a [`TreeItem`]; the tree is rebuilt from registry snapshots
//! on demand and holds no state of its own.
//!
//! ```text
//!   Workspace
//!   ├── Provider
//!   │   └── Target
//!   └── Job (newest first)
//! ```

use std::cmp::Reverse;

use crate::job::Job;
use crate::registry::WorkspaceRegistry;
use crate::workspace::Target;

/// Discriminant of a [`TreeItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeItemKind {
    Workspace,
    Provider,
    Target,
    Job,
}

/// One node of the workspace tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeItem {
    Workspace {
        workspace_id: String,
        name: String,
    },
    Provider {
        workspace_id: String,
        provider_id: String,
    },
    Target {
        workspace_id: String,
        provider_id: String,
        target: Target,
    },
    Job {
        workspace_id: String,
        job: Job,
    },
}

impl TreeItem {
    /// Node type.
    pub fn kind(&self) -> TreeItemKind {
        match self {
            TreeItem::Workspace { .. } => TreeItemKind::Workspace,
            TreeItem::Provider { .. } => TreeItemKind::Provider,
            TreeItem::Target { .. } => TreeItemKind::Target,
            TreeItem::Job { .. } => TreeItemKind::Job,
        }
    }

    /// Workspace this node belongs to.
    pub fn workspace_id(&self) -> &str {
        match self {
            TreeItem::Workspace { workspace_id, .. }
            | TreeItem::Provider { workspace_id, .. }
            | TreeItem::Target { workspace_id, .. }
            | TreeItem::Job { workspace_id, .. } => workspace_id,
        }
    }

    /// Display label.
    pub fn label(&self) -> String {
        match self {
            TreeItem::Workspace { name, .. } => name.clone(),
            TreeItem::Provider { provider_id, .. } => provider_id.clone(),
            TreeItem::Target { target, .. } => target.id.clone(),
            TreeItem::Job { job, .. } => format!("{} ({})", job.display_name(), job.status),
        }
    }

    /// Top-level nodes, one per registered workspace.
    pub fn roots(registry: &WorkspaceRegistry) -> Vec<TreeItem> {
        registry
            .snapshot()
            .into_iter()
            .map(|ws| TreeItem::Workspace {
                workspace_id: ws.id,
                name: ws.name,
            })
            .collect()
    }

    /// Children of this node in the current registry state.
    pub fn children(&self, registry: &WorkspaceRegistry) -> Vec<TreeItem> {
        let Some(ws) = registry.get(self.workspace_id()) else {
            return Vec::new();
        };

        match self {
            TreeItem::Workspace { workspace_id, .. } => {
                let providers = ws.providers.iter().map(|p| TreeItem::Provider {
                    workspace_id: workspace_id.clone(),
                    provider_id: p.id.clone(),
                });

                let mut jobs = ws.jobs.clone();
                jobs.sort_by_key(|j| Reverse(j.creation_time));
                let jobs = jobs.into_iter().map(|job| TreeItem::Job {
                    workspace_id: workspace_id.clone(),
                    job,
                });

                providers.chain(jobs).collect()
            }
            TreeItem::Provider {
                workspace_id,
                provider_id,
            } => ws
                .provider(provider_id)
                .map(|p| {
                    p.targets
                        .iter()
                        .map(|t| TreeItem::Target {
                            workspace_id: workspace_id.clone(),
                            provider_id: provider_id.clone(),
                            target: t.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            TreeItem::Target { .. } | TreeItem::Job { .. } => Vec::new(),
        }
    }
}

/// UI context flags derived from the current selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    /// Selection is a target that accepts QIR.
    pub supports_qir: bool,
    /// Selection is a job with downloadable results.
    pub supports_download: bool,
    /// Selection is a workspace.
    pub is_workspace: bool,
}

impl ContextFlags {
    /// Flags for a selection; all false when nothing is selected.
    pub fn for_selection(selection: Option<&TreeItem>) -> Self {
        match selection {
            Some(TreeItem::Workspace { .. }) => Self {
                is_workspace: true,
                ..Self::default()
            },
            Some(TreeItem::Target { target, .. }) => Self {
                supports_qir: target.supports_qir(),
                ..Self::default()
            },
            Some(TreeItem::Job { job, .. }) => Self {
                supports_download: job.has_results(),
                ..Self::default()
            },
            Some(TreeItem::Provider { .. }) | None => Self::default(),
        }
    }
}
