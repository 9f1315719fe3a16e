//! Configuration types for update-stager

use crate::error::{Error, Result};
use crate::types::UpdateType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Artifact store configuration (directories and naming)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding update artifacts and changelog sidecars (default: "./updates")
    #[serde(default = "default_updates_dir")]
    pub updates_dir: PathBuf,

    /// File extension recognised as an update artifact (default: ".zip")
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Where a completed artifact is copied for the installer (default: "./cache/update.zip")
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            updates_dir: default_updates_dir(),
            artifact_extension: default_artifact_extension(),
            staging_path: default_staging_path(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./update-stager.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Download request and progress settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Interval between progress polls in milliseconds (default: 1000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Package identifier, first half of the User-Agent
    #[serde(default = "default_package_id")]
    pub package_id: String,

    /// Package version, second half of the User-Agent
    #[serde(default = "default_package_version")]
    pub package_version: String,

    /// Title attached to download requests
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Verify the artifact checksum on completion when the record carries one (default: true)
    #[serde(default = "default_true")]
    pub verify_md5: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            package_id: default_package_id(),
            package_version: default_package_version(),
            app_name: default_app_name(),
            verify_md5: true,
        }
    }
}

impl DownloadConfig {
    /// Progress poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `<package-id>/<version>`
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.package_id, self.package_version)
    }
}

/// Pruning of downloaded artifacts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Delete local artifacts that are not newer than the installed version (default: true)
    #[serde(default = "default_true")]
    pub delete_obsolete: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            delete_obsolete: true,
        }
    }
}

/// Names of the platform properties describing the device
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Property holding the device (board) name
    #[serde(default = "default_device_property")]
    pub device_property: String,

    /// Property holding the installed version
    #[serde(default = "default_version_property")]
    pub version_property: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            device_property: default_device_property(),
            version_property: default_version_property(),
        }
    }
}

/// Defaults for the persisted update-check settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Seconds between checks used until the user picks one (default: -1, check at boot only)
    #[serde(default = "default_check_frequency")]
    pub check_frequency_secs: i64,

    /// Update channel used until the user picks one
    #[serde(default)]
    pub update_type: UpdateType,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_frequency_secs: default_check_frequency(),
            update_type: UpdateType::default(),
        }
    }
}

/// Main configuration for DownloadOrchestrator
///
/// Fields are organized into logical sub-configs:
/// - [`store`](StoreConfig) - updates directory, artifact extension, staging path
/// - [`persistence`](PersistenceConfig) - database location
/// - [`download`](DownloadConfig) - poll interval, request headers, verification
/// - [`retention`](RetentionConfig) - pruning of obsolete artifacts
/// - [`platform`](PlatformConfig) - platform property names
/// - [`checks`](CheckConfig) - defaults for persisted check settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Artifact store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retention policy
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Platform property names
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Check settings defaults
    #[serde(default)]
    pub checks: CheckConfig,
}

impl Config {
    /// Load a configuration from a JSON file, then validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would make the orchestrator misbehave
    pub fn validate(&self) -> Result<()> {
        if !self.store.artifact_extension.starts_with('.') || self.store.artifact_extension.len() < 2
        {
            return Err(Error::Config {
                message: format!(
                    "artifact extension must look like '.zip', got '{}'",
                    self.store.artifact_extension
                ),
                key: Some("store.artifact_extension".into()),
            });
        }

        if self.download.poll_interval_ms == 0 {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".into(),
                key: Some("download.poll_interval_ms".into()),
            });
        }

        if self.download.package_id.trim().is_empty() {
            return Err(Error::Config {
                message: "package id must not be empty".into(),
                key: Some("download.package_id".into()),
            });
        }

        Ok(())
    }

    /// Updates directory
    pub fn updates_dir(&self) -> &PathBuf {
        &self.store.updates_dir
    }
}

// Default value functions
fn default_updates_dir() -> PathBuf {
    PathBuf::from("updates")
}

fn default_artifact_extension() -> String {
    ".zip".into()
}

fn default_staging_path() -> PathBuf {
    PathBuf::from("cache").join("update.zip")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("update-stager.db")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_package_id() -> String {
    env!("CARGO_PKG_NAME").into()
}

fn default_package_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_app_name() -> String {
    "System updates".into()
}

fn default_device_property() -> String {
    "ro.product.device".into()
}

fn default_version_property() -> String {
    "ro.modversion".into()
}

fn default_check_frequency() -> i64 {
    -1
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.store.updates_dir, PathBuf::from("updates"));
        assert_eq!(config.store.artifact_extension, ".zip");
        assert_eq!(config.download.poll_interval(), Duration::from_secs(1));
        assert!(config.retention.delete_obsolete);
        assert!(config.download.verify_md5);
        assert_eq!(config.checks.update_type, UpdateType::Stable);
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let json = r#"{
            "store": { "updates_dir": "/data/updates" },
            "retention": { "delete_obsolete": false }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.store.updates_dir, PathBuf::from("/data/updates"));
        assert_eq!(config.store.artifact_extension, ".zip");
        assert!(!config.retention.delete_obsolete);
    }

    #[test]
    fn user_agent_is_package_slash_version() {
        let download = DownloadConfig {
            package_id: "org.example.updater".into(),
            package_version: "2.1".into(),
            ..Default::default()
        };
        assert_eq!(download.user_agent(), "org.example.updater/2.1");
    }

    #[test]
    fn validate_rejects_bad_extension() {
        let mut config = Config::default();
        config.store.artifact_extension = "zip".into();

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("store.artifact_extension"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.download.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_json_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "download": { "poll_interval_ms": 250 } }"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.download.poll_interval(), Duration::from_millis(250));

        std::fs::write(&path, r#"{ "download": { "poll_interval_ms": 0 } }"#).unwrap();
        assert!(Config::from_json_file(&path).is_err());
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
