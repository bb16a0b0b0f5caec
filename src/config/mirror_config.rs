//! ghmirror configuration file handling
//!
//! Loads ~/.config/ghmirror/config.yaml. Secrets may be left out of the file
//! and supplied through `GITHUB_TOKEN` / `GH_WEBHOOK_SECRET` instead.

use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `github.token`
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable overriding `webhook.secret`
pub const WEBHOOK_SECRET_ENV: &str = "GH_WEBHOOK_SECRET";

/// GitHub API access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API root (https://api.github.com, or https://host/api/v3 for GHE)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Personal access or app token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Document store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Enable WAL so `sync` and `serve` can share the file
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// How long a writer waits on a locked database, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    let mut path = config_dir();
    path.push("mirror.db");
    path
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Webhook receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Address the server binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Shared secret configured on the GitHub webhook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            secret: None,
        }
    }
}

/// Rate governor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Suspend fetching once this few calls remain in the window
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    /// Extra wait after the advertised reset, in seconds
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,
}

fn default_threshold() -> u64 {
    50
}

fn default_safety_margin_secs() -> u64 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            safety_margin_secs: default_safety_margin_secs(),
        }
    }
}

/// ghmirror configuration
///
/// Passed explicitly to the orchestrator and the webhook server; nothing in
/// the crate reads settings from global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl MirrorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file is not an error: defaults plus environment
    /// overrides are enough to run a sync. An explicitly named file must
    /// exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "No config file, using defaults");
                    Self::new()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::MirrorError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading ghmirror configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        tracing::debug!(
            api_url = %config.github.api_url,
            store = %config.store.path.display(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving ghmirror configuration");

        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Get the default config path (~/.config/ghmirror/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = config_dir();
        path.push("config.yaml");
        path
    }

    /// Environment variables take precedence over the file
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(WEBHOOK_SECRET_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, token: Option<String>, secret: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.github.token = Some(token);
        }
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.webhook.secret = Some(secret);
        }
    }
}

fn config_dir() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("ghmirror");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MirrorConfig::new();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.rate_limit.threshold, 50);
        assert_eq!(config.rate_limit.safety_margin_secs, 120);
        assert!(config.store.wal_mode);
        assert!(config.store.path.ends_with("ghmirror/mirror.db"));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "github:\n  api_url: https://ghe.example.com/api/v3\nrate_limit:\n  threshold: 100\n";
        let config: MirrorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.github.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.rate_limit.threshold, 100);
        assert_eq!(config.rate_limit.safety_margin_secs, 120);
        assert_eq!(config.webhook.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();

        let mut config = MirrorConfig::new();
        config.webhook.bind = "0.0.0.0:9000".to_string();
        config.store.path = PathBuf::from("/var/lib/ghmirror/mirror.db");
        config.save(temp_file.path()).unwrap();

        let loaded = MirrorConfig::load(temp_file.path()).unwrap();
        assert_eq!(loaded.webhook.bind, "0.0.0.0:9000");
        assert_eq!(loaded.store.path, PathBuf::from("/var/lib/ghmirror/mirror.db"));
    }

    #[test]
    fn test_secrets_are_not_written_when_unset() {
        let yaml = serde_yaml::to_string(&MirrorConfig::new()).unwrap();
        assert!(!yaml.contains("token"));
        assert!(!yaml.contains("secret"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(MirrorConfig::load("/nonexistent/ghmirror.yaml").is_err());
        assert!(MirrorConfig::load_or_default(Some(Path::new("/nonexistent/ghmirror.yaml"))).is_err());
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "github: [unclosed").unwrap();

        let err = MirrorConfig::load(temp_file.path()).unwrap_err();
        assert!(err
            .to_string()
            .contains(&temp_file.path().display().to_string()));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = MirrorConfig::new();
        config.github.token = Some("from-file".to_string());

        config.apply_overrides(Some("from-env".to_string()), Some("hush".to_string()));
        assert_eq!(config.github.token.as_deref(), Some("from-env"));
        assert_eq!(config.webhook.secret.as_deref(), Some("hush"));

        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.github.token.as_deref(), Some("from-env"));
    }
}
