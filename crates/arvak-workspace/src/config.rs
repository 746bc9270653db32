//! Configuration for workspace tracking.
//!
//! Supports loading configuration from:
//! 1. A YAML file (path from `ARVAK_WS_CONFIG`)
//! 2. Environment variables (`ARVAK_WS_` prefix)
//!
//! Precedence (highest to lowest): environment, file, defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::persistence::FileCredentialStore;
use crate::refresh::RefreshConfig;

/// Default service API version.
pub const DEFAULT_API_VERSION: &str = "2022-09-12-preview";

/// Largest accepted `backoff_factor`.
pub const MAX_BACKOFF_FACTOR: f64 = 100.0;

/// Complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Refresh cycle schedule.
    #[serde(default)]
    pub refresh: RefreshSettings,

    /// Credential file; defaults to `{config_dir}/arvak/credentials.json`.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Service API version sent with every request.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Refresh schedule in serializable units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_missing_job_grace_ticks")]
    pub missing_job_grace_ticks: u32,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_initial_interval_ms() -> u64 {
    1_000
}

fn default_max_interval_ms() -> u64 {
    60_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_missing_job_grace_ticks() -> u32 {
    10
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            backoff_factor: default_backoff_factor(),
            missing_job_grace_ticks: default_missing_job_grace_ticks(),
        }
    }
}

impl From<&RefreshSettings> for RefreshConfig {
    fn from(s: &RefreshSettings) -> Self {
        RefreshConfig {
            initial_interval: Duration::from_millis(s.initial_interval_ms),
            max_interval: Duration::from_millis(s.max_interval_ms),
            backoff_factor: s.backoff_factor,
            missing_job_grace_ticks: s.missing_job_grace_ticks,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshSettings::default(),
            credentials_path: None,
            log_level: default_log_level(),
            api_version: default_api_version(),
        }
    }
}

impl WorkspaceConfig {
    /// Load from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> WorkspaceResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WorkspaceError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse YAML.
    pub fn from_yaml(yaml: &str) -> WorkspaceResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| WorkspaceError::Configuration(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overlaid by the `ARVAK_WS_CONFIG` file and then by
    /// environment variables.
    pub fn load() -> WorkspaceResult<Self> {
        let mut config = match std::env::var("ARVAK_WS_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> WorkspaceResult<()> {
        if let Some(path) = lookup("ARVAK_WS_CREDENTIALS") {
            self.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup("ARVAK_WS_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(version) = lookup("ARVAK_WS_API_VERSION") {
            self.api_version = version;
        }
        if let Some(ms) = lookup("ARVAK_WS_REFRESH_INITIAL_MS") {
            self.refresh.initial_interval_ms = ms.parse().map_err(|_| {
                WorkspaceError::Configuration(format!(
                    "ARVAK_WS_REFRESH_INITIAL_MS must be an integer, got '{ms}'"
                ))
            })?;
        }
        if let Some(ms) = lookup("ARVAK_WS_REFRESH_MAX_MS") {
            self.refresh.max_interval_ms = ms.parse().map_err(|_| {
                WorkspaceError::Configuration(format!(
                    "ARVAK_WS_REFRESH_MAX_MS must be an integer, got '{ms}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Check values for consistency.
    pub fn validate(&self) -> WorkspaceResult<()> {
        let r = &self.refresh;
        if r.initial_interval_ms == 0 || r.max_interval_ms == 0 {
            return Err(WorkspaceError::Configuration(
                "refresh intervals must be greater than zero".into(),
            ));
        }
        if r.max_interval_ms < r.initial_interval_ms {
            return Err(WorkspaceError::Configuration(format!(
                "max_interval_ms ({}) is below initial_interval_ms ({})",
                r.max_interval_ms, r.initial_interval_ms
            )));
        }
        if !(1.0..=MAX_BACKOFF_FACTOR).contains(&r.backoff_factor) {
            return Err(WorkspaceError::Configuration(format!(
                "backoff_factor must be between 1.0 and {MAX_BACKOFF_FACTOR}, got {}",
                r.backoff_factor
            )));
        }
        if self.api_version.trim().is_empty() {
            return Err(WorkspaceError::Configuration("api_version is empty".into()));
        }
        Ok(())
    }

    /// Refresh schedule for the refresh manager.
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::from(&self.refresh)
    }

    /// Credential file path, falling back to the default location.
    pub fn credentials_path(&self) -> WorkspaceResult<PathBuf> {
        match &self.credentials_path {
            Some(p) => Ok(p.clone()),
            None => FileCredentialStore::default_path(),
        }
    }
}
