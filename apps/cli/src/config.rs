//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/dxsync/config.toml`
//! - Windows: `%APPDATA%/dxsync/config.toml`
//!
//! `WORKSPACE_ID` and `BASE_URL` in the environment override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use dxsync_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, RetryPolicy};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// DX API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Target workspace id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    /// Bytes per resumable chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Payloads above this many bytes are sent in chunks.
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Files holding pre-fetched secrets.
    #[serde(default)]
    pub secrets: SecretFiles,
}

/// Backoff for transient network failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// Paths of secret files. Environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretFiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<PathBuf>,
}

fn default_base_url() -> String {
    dxsync_platform::DEFAULT_BASE_URL.into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_threshold() -> u64 {
    DEFAULT_CHUNK_THRESHOLD
}

fn default_request_timeout() -> u64 {
    dxsync_platform::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_initial_delay_ms() -> u64 {
    RetryPolicy::default().initial_delay.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    RetryPolicy::default().max_delay.as_millis() as u64
}

fn default_backoff_factor() -> f64 {
    RetryPolicy::default().backoff_factor
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_factor: if self.backoff_factor.is_finite() {
                self.backoff_factor.max(1.0)
            } else {
                1.0
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            workspace_id: None,
            chunk_size: default_chunk_size(),
            chunk_threshold: default_chunk_threshold(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
            secrets: SecretFiles::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies `WORKSPACE_ID` and `BASE_URL` overrides.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(id) = env("WORKSPACE_ID").filter(|v| !v.trim().is_empty()) {
            self.workspace_id = Some(id);
        }
        if let Some(url) = env("BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("dxsync").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("dxsync")
            .join("config.toml")
    }
}
