//! Credential store and persisted workspace list.
//!
//! The credential store is an opaque string key/value secret store. The list
//! of known workspaces is kept in it as JSON under [`WORKSPACES_KEY`], with
//! providers and jobs always empty (they are refetched on load).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::workspace::WorkspaceConnection;

/// Key the workspace list is stored under.
pub const WORKSPACES_KEY: &str = "arvak.workspaces";

/// Secret key/value storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> WorkspaceResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn store(&self, key: &str, value: &str) -> WorkspaceResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> WorkspaceResult<()>;
}

/// In-memory credential store.
#[derive(Default, Clone)]
pub struct MemoryCredentialStore {
    values: Arc<RwLock<FxHashMap<String, String>>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> WorkspaceResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> WorkspaceResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> WorkspaceResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Credential store backed by a single JSON object file.
///
/// The file is rewritten on every change and restricted to the owner on Unix.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `{config_dir}/arvak/credentials.json`.
    pub fn default_path() -> WorkspaceResult<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("arvak").join("credentials.json"))
            .ok_or_else(|| {
                WorkspaceError::Configuration("Could not determine config directory".into())
            })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> WorkspaceResult<FxHashMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(FxHashMap::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                WorkspaceError::Persistence(format!(
                    "Corrupt credential file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FxHashMap::default()),
            Err(e) => Err(WorkspaceError::Io(e)),
        }
    }

    async fn write_all(&self, values: &FxHashMap<String, String>) -> WorkspaceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path).await?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).await?;
        }

        debug!("Wrote credential file {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> WorkspaceResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn store(&self, key: &str, value: &str) -> WorkspaceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn delete(&self, key: &str) -> WorkspaceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

/// Reads and writes the persisted workspace list.
#[derive(Clone)]
pub struct WorkspaceStore {
    store: Arc<dyn CredentialStore>,
}

impl WorkspaceStore {
    /// Wrap a credential store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Load the persisted workspaces. A missing entry is an empty list.
    pub async fn load(&self) -> WorkspaceResult<Vec<WorkspaceConnection>> {
        let Some(json) = self.store.get(WORKSPACES_KEY).await? else {
            return Ok(Vec::new());
        };
        let mut workspaces: Vec<WorkspaceConnection> = serde_json::from_str(&json)
            .map_err(|e| WorkspaceError::Persistence(format!("Corrupt workspace list: {e}")))?;

        let before = workspaces.len();
        let mut seen = rustc_hash::FxHashSet::default();
        workspaces.retain(|ws| seen.insert(ws.id.clone()));
        if workspaces.len() != before {
            warn!(
                "Dropped {} duplicate workspace record(s)",
                before - workspaces.len()
            );
        }

        Ok(workspaces)
    }

    /// Persist the given workspaces, without their providers or jobs.
    pub async fn save(&self, workspaces: &[WorkspaceConnection]) -> WorkspaceResult<()> {
        let persisted: Vec<_> = workspaces.iter().map(WorkspaceConnection::persisted).collect();
        let json = serde_json::to_string(&persisted)?;
        self.store.store(WORKSPACES_KEY, &json).await
    }
}
