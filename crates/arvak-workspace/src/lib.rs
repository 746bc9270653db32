//! Arvak Workspace Tracking
//!
//! This crate keeps a local, eventually consistent view of remote quantum
//! workspaces: their providers, targets, and jobs. Views are refreshed by
//! polling the remote service until every job has reached a terminal state.
//!
//! # Overview
//!
//! - [`WorkspaceRegistry`] holds the latest snapshot for each workspace, keyed
//!   by resource id, and broadcasts [`RegistryEvent`]s on every change
//! - [`RefreshManager`] runs one polling cycle per workspace with exponential
//!   backoff; a new cycle supersedes an older one for the same workspace
//! - [`RemoteApiClient`] is the seam to the remote service (see
//!   `arvak-adapter-azure` for the Azure Quantum implementation)
//! - [`WorkspaceService`] implements the user commands: add, remove, refresh,
//!   submit, and download
//! - [`TreeItem`] and [`ContextFlags`] describe the presentation tree and the
//!   actions available for a selection
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use arvak_workspace::{
//!     FileCredentialStore, RefreshConfig, WorkspaceRegistry, WorkspaceService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(arvak_adapter_azure::AzureQuantumClient::new()?);
//!     let store = Arc::new(FileCredentialStore::new(FileCredentialStore::default_path()?));
//!     let service = WorkspaceService::new(
//!         WorkspaceRegistry::new(),
//!         client,
//!         store,
//!         RefreshConfig::default(),
//!     );
//!
//!     for handle in service.load_persisted().await? {
//!         let id = handle.workspace_id().to_string();
//!         println!("{id} -> {:?}", handle.outcome().await);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod persistence;
pub mod refresh;
pub mod registry;
pub mod service;
pub mod tree;
pub mod workspace;

pub use client::{BlobLocation, JobSubmission, RemoteApiClient};
pub use config::{RefreshSettings, WorkspaceConfig};
pub use error::{WorkspaceError, WorkspaceResult};
pub use job::{Job, JobError, JobStatus};
pub use persistence::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, WORKSPACES_KEY, WorkspaceStore,
};
pub use refresh::{RefreshConfig, RefreshHandle, RefreshManager, RefreshOutcome};
pub use registry::{RegistryEvent, WorkspaceRegistry};
pub use service::{ProgramSource, StaticProgram, SubmitRequest, SubmittedJob, WorkspaceService};
pub use tree::{ContextFlags, TreeItem, TreeItemKind};
pub use workspace::{Provider, Target, TargetProfile, WorkspaceConnection, WorkspaceSnapshot};
