//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use arvak_adapter_azure::AzureQuantumClient;
use arvak_workspace::{
    CredentialStore, FileCredentialStore, JobStatus, RemoteApiClient, WorkspaceConfig,
    WorkspaceConnection, WorkspaceRegistry, WorkspaceService, WorkspaceStore,
};

/// Load the configuration from `path`, or from the default sources.
pub fn load_config(path: Option<&Path>) -> Result<WorkspaceConfig> {
    let config = match path {
        Some(path) => {
            let mut config = WorkspaceConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => WorkspaceConfig::load()?,
    };
    Ok(config)
}

/// Everything a command needs to talk to its workspaces.
pub struct Context {
    pub client: Arc<AzureQuantumClient>,
    pub service: WorkspaceService,
}

impl Context {
    /// Build the client and service, and register persisted workspaces
    /// without refreshing them.
    pub async fn open(config: WorkspaceConfig) -> Result<Self> {
        let client = Arc::new(AzureQuantumClient::new()?.with_api_version(&config.api_version));
        debug!("Using Azure Quantum API version {}", client.api_version());

        let path = config.credentials_path()?;
        debug!("Using credential file {}", path.display());
        let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));

        let registry = WorkspaceRegistry::new();
        let persisted = WorkspaceStore::new(Arc::clone(&credentials))
            .load()
            .await
            .context("Failed to load connected workspaces")?;
        for ws in persisted {
            registry.upsert(ws.persisted());
        }

        let remote: Arc<dyn RemoteApiClient> = client.clone();
        let service = WorkspaceService::new(registry, remote, credentials, config.refresh_config());
        Ok(Self { client, service })
    }

    /// Resolve a workspace id or name to a registered id.
    pub fn resolve(&self, key: &str) -> Result<String> {
        resolve_key(&self.service.registry().snapshot(), key)
    }

    /// Fetch the current providers and jobs of a workspace once.
    pub async fn fetch(&self, workspace_id: &str) -> Result<WorkspaceConnection> {
        let registry = self.service.registry();
        let ws = registry
            .get(workspace_id)
            .ok_or_else(|| anyhow::anyhow!("Workspace {workspace_id} is not connected"))?;

        let snapshot = self
            .client
            .list_workspace_snapshot(&ws)
            .await
            .with_context(|| format!("Failed to refresh workspace '{}'", ws.name))?;
        registry.upsert_snapshot(workspace_id, snapshot);

        registry
            .get(workspace_id)
            .ok_or_else(|| anyhow::anyhow!("Workspace {workspace_id} was removed"))
    }
}

/// Match `key` against workspace ids first, then against unique names.
pub fn resolve_key(workspaces: &[WorkspaceConnection], key: &str) -> Result<String> {
    if let Some(ws) = workspaces.iter().find(|ws| ws.id == key) {
        return Ok(ws.id.clone());
    }

    let matches: Vec<&WorkspaceConnection> = workspaces
        .iter()
        .filter(|ws| ws.name.eq_ignore_ascii_case(key))
        .collect();

    match matches.as_slice() {
        [ws] => Ok(ws.id.clone()),
        [] => anyhow::bail!(
            "No connected workspace named '{key}'. Use 'arvak-ws workspace list' to see them."
        ),
        _ => anyhow::bail!("Several workspaces are named '{key}'. Pass the full resource id."),
    }
}

/// Styled status name.
pub fn styled_status(status: &JobStatus) -> StyledObject<&str> {
    let s = style(status.as_str());
    match status {
        JobStatus::Succeeded => s.green(),
        JobStatus::Failed => s.red(),
        JobStatus::Cancelled | JobStatus::CancellationRequested => s.yellow(),
        JobStatus::Waiting | JobStatus::Executing | JobStatus::Finishing => s.cyan(),
        JobStatus::Unknown(_) => s.dim(),
    }
}

/// Spinner on stderr.
pub fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(spinner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspaces() -> Vec<WorkspaceConnection> {
        vec![
            WorkspaceConnection::new("/subs/1/Workspaces/alpha", "alpha", "https://a"),
            WorkspaceConnection::new("/subs/2/Workspaces/beta", "beta", "https://b"),
            WorkspaceConnection::new("/subs/3/Workspaces/beta", "beta", "https://c"),
        ]
    }

    #[test]
    fn test_resolve_by_id() {
        let id = resolve_key(&workspaces(), "/subs/2/Workspaces/beta").unwrap();
        assert_eq!(id, "/subs/2/Workspaces/beta");
    }

    #[test]
    fn test_resolve_by_name_case_insensitive() {
        let id = resolve_key(&workspaces(), "ALPHA").unwrap();
        assert_eq!(id, "/subs/1/Workspaces/alpha");
    }

    #[test]
    fn test_resolve_ambiguous_name() {
        let err = resolve_key(&workspaces(), "beta").unwrap_err();
        assert!(err.to_string().contains("resource id"));
    }

    #[test]
    fn test_resolve_unknown() {
        let err = resolve_key(&workspaces(), "gamma").unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.yaml");
        std::fs::write(&path, "log_level: debug\nrefresh:\n  max_interval_ms: 5000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.refresh.max_interval_ms, 5000);
        assert_eq!(config.refresh.initial_interval_ms, 1000);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.yaml"))).is_err());
    }

    #[test]
    fn test_styled_status_keeps_name() {
        assert_eq!(
            styled_status(&JobStatus::Unknown("Paused".into()))
                .force_styling(false)
                .to_string(),
            "Paused"
        );
    }
}
