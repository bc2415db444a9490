use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub analytics: AnalyticsConfig,
    pub analyzer: AnalyzerConfig,
}

/// Where the review document lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    Remote,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub local: LocalStorageConfig,
    pub remote: RemoteStorageConfig,
    /// Upper bound for each backend request
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Local,
            local: LocalStorageConfig::default(),
            remote: RemoteStorageConfig::default(),
            timeout_secs: 10,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Local file backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    pub path: PathBuf,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reviews.json"),
        }
    }
}

/// Remote document (GitHub repository file) configuration.
///
/// The access token is never read from this file; it comes from `GITHUB_TOKEN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteStorageConfig {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub raw_base_url: String,
    pub api_base_url: String,
    pub commit_message: String,
}

impl Default for RemoteStorageConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            path: "reviews.json".to_string(),
            branch: "main".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            api_base_url: "https://api.github.com".to_string(),
            commit_message: "Update reviews".to_string(),
        }
    }
}

/// Analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// How many of the newest reviews the summary carries
    pub recent_window: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { recent_window: 10 }
    }
}

/// Generative-language API configuration.
///
/// The API key comes from `GEMINI_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), mode = ?config.storage.mode, "Loaded configuration");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.mode, StorageMode::Local);
        assert_eq!(config.storage.local.path, PathBuf::from("reviews.json"));
        assert_eq!(config.storage.timeout(), Duration::from_secs(10));
        assert_eq!(config.analytics.recent_window, 10);
        assert_eq!(config.analyzer.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
storage:
  mode: remote
  remote:
    owner: acme
    repo: feedback
    branch: data

analytics:
  recent_window: 20
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Remote);
        assert_eq!(config.storage.remote.owner, "acme");
        assert_eq!(config.storage.remote.branch, "data");
        // Unset keys keep their defaults
        assert_eq!(config.storage.remote.path, "reviews.json");
        assert_eq!(config.storage.timeout_secs, 10);
        assert_eq!(config.analytics.recent_window, 20);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Local);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "storage: [not, a, map").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
