//! Core types for update-stager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque identifier handed out by the download engine for one transfer request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHandle(pub i64);

impl DownloadHandle {
    /// Create a new DownloadHandle
    pub fn new(handle: i64) -> Self {
        Self(handle)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DownloadHandle {
    fn from(handle: i64) -> Self {
        Self(handle)
    }
}

impl From<DownloadHandle> for i64 {
    fn from(handle: DownloadHandle) -> Self {
        handle.0
    }
}

impl std::fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DownloadHandle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Where an update record came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrigin {
    /// Advertised by the remote catalog
    Server,
    /// Present in the local updates directory
    Local,
}

/// One update package, from the server catalog or the local artifact store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Display name
    pub name: String,
    /// Stable unique key across server and local origin
    pub file_name: String,
    /// Download location (server-origin records only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Content checksum (hex)
    #[serde(default)]
    pub md5: String,
    /// Free-form changelog, read lazily from the sidecar for local records
    #[serde(default)]
    pub changelog: String,
    /// Origin of this record
    pub origin: RecordOrigin,
}

impl UpdateRecord {
    /// Build a server-origin record
    pub fn server(
        file_name: impl Into<String>,
        download_url: impl Into<String>,
        md5: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            name: file_name.clone(),
            file_name,
            download_url: Some(download_url.into()),
            md5: md5.into(),
            changelog: String::new(),
            origin: RecordOrigin::Server,
        }
    }

    /// Build a local-origin record for an artifact already on disk
    pub fn local(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            name: file_name.clone(),
            file_name,
            download_url: None,
            md5: String::new(),
            changelog: String::new(),
            origin: RecordOrigin::Local,
        }
    }

    /// Attach a changelog
    pub fn with_changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = changelog.into();
        self
    }

    /// Version string embedded in the file name
    ///
    /// `extension` is removed first, then everything up to and including the
    /// first `-`. A name without a dash is its own version string.
    pub fn version_string(&self, extension: &str) -> &str {
        version_from_file_name(&self.file_name, extension)
    }

    /// User-friendly title with the `-<device><extension>` tail removed
    pub fn display_title(&self, device: &str, extension: &str) -> String {
        self.file_name
            .replace(&format!("-{device}{extension}"), "")
    }
}

/// Extract the version string from an artifact file name
///
/// ```
/// use update_stager::types::version_from_file_name;
///
/// assert_eq!(version_from_file_name("cm-10.1.0-mako.zip", ".zip"), "10.1.0-mako");
/// assert_eq!(version_from_file_name("update-10.zip", ".zip"), "10");
/// ```
pub fn version_from_file_name<'a>(file_name: &'a str, extension: &str) -> &'a str {
    let stem = file_name.strip_suffix(extension).unwrap_or(file_name);
    match stem.split_once('-') {
        Some((_, version)) => version,
        None => stem,
    }
}

/// Update list as delivered by the catalog source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCatalog {
    /// Full update packages, newest first
    #[serde(default)]
    pub full_updates: Vec<UpdateRecord>,
    /// Incremental update packages, newest first
    #[serde(default)]
    pub incremental_updates: Vec<UpdateRecord>,
}

impl UpdateCatalog {
    /// Full updates followed by incremental updates, as one ordered list
    pub fn into_records(self) -> Vec<UpdateRecord> {
        let mut records = self.full_updates;
        records.extend(self.incremental_updates);
        records
    }
}

/// Deduplicated union of server-advertised and locally present updates
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogView {
    /// Server records without a local match, in server order
    pub server_only: Vec<UpdateRecord>,
    /// Local artifacts, newest version first
    pub local: Vec<UpdateRecord>,
}

/// How a catalog row relates to the device and the active download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Available on the server, not downloaded
    New,
    /// Being downloaded right now
    Downloading,
    /// Present in the local updates directory
    Downloaded,
    /// The version currently running on the device
    Installed,
}

/// A catalog row paired with its status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// The update record
    pub record: UpdateRecord,
    /// Status of the record
    pub status: RecordStatus,
}

impl CatalogView {
    /// True when neither list holds a record
    pub fn is_empty(&self) -> bool {
        self.server_only.is_empty() && self.local.is_empty()
    }

    /// Look up a record by file name in either list
    pub fn find(&self, file_name: &str) -> Option<&UpdateRecord> {
        self.server_only
            .iter()
            .chain(self.local.iter())
            .find(|r| r.file_name == file_name)
    }

    /// Pair every record with its status, server rows first
    ///
    /// `installed_version` is matched against `<installed_version><extension>`.
    pub fn classify(
        &self,
        active_file: Option<&str>,
        installed_version: &str,
        extension: &str,
    ) -> Vec<CatalogEntry> {
        let installed_file = format!("{installed_version}{extension}");

        let server = self.server_only.iter().map(|record| {
            let status = if active_file == Some(record.file_name.as_str()) {
                RecordStatus::Downloading
            } else if record.file_name == installed_file {
                RecordStatus::Installed
            } else {
                RecordStatus::New
            };
            CatalogEntry {
                record: record.clone(),
                status,
            }
        });

        let local = self.local.iter().map(|record| CatalogEntry {
            record: record.clone(),
            status: if record.file_name == installed_file {
                RecordStatus::Installed
            } else {
                RecordStatus::Downloaded
            },
        });

        server.chain(local).collect()
    }
}

/// Download session state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No download
    #[default]
    Idle,
    /// A transfer is in flight
    Downloading,
    /// The artifact arrived and verified, awaiting acknowledgement
    Completed,
    /// The transfer was cancelled
    Cancelled,
    /// The transfer failed, awaiting acknowledgement
    Failed,
}

impl SessionState {
    /// Whether the state waits for `acknowledge` before returning to idle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Downloading => "downloading",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The single permitted download session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSession {
    /// Engine handle of the transfer
    pub handle: Option<DownloadHandle>,
    /// File name of the update being fetched
    pub file_name: Option<String>,
    /// Expected checksum
    pub md5: String,
    /// Bytes received so far
    pub bytes_downloaded: u64,
    /// Total size, when the engine knows it
    pub bytes_total: Option<u64>,
    /// Current state
    pub state: SessionState,
    /// Final artifact path once completed
    pub final_path: Option<PathBuf>,
    /// Why the session failed
    pub failure_reason: Option<String>,
}

impl DownloadSession {
    /// Fresh session in `Downloading` state
    pub(crate) fn downloading(handle: DownloadHandle, file_name: String, md5: String) -> Self {
        Self {
            handle: Some(handle),
            file_name: Some(file_name),
            md5,
            state: SessionState::Downloading,
            ..Default::default()
        }
    }

    /// Whether a transfer is in flight
    pub fn is_downloading(&self) -> bool {
        self.state == SessionState::Downloading
    }

    /// Progress as a fraction in `0.0..=1.0`, `None` while the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_total {
            Some(0) | None => None,
            Some(total) => Some((self.bytes_downloaded as f64 / total as f64).min(1.0)),
        }
    }
}

/// Which update channel the catalog source should offer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Stable releases only
    #[default]
    Stable,
    /// Every release, including nightlies
    All,
}

impl UpdateType {
    /// Convert persisted integer code to UpdateType
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => UpdateType::All,
            _ => UpdateType::Stable, // Default to Stable for unknown codes
        }
    }

    /// Convert UpdateType to its persisted integer code
    pub fn to_i32(&self) -> i32 {
        match self {
            UpdateType::Stable => 0,
            UpdateType::All => 1,
        }
    }
}

/// User settings persisted alongside the session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Seconds between automatic checks (0 or negative disables periodic checks)
    pub check_frequency_secs: i64,
    /// Update channel filter
    pub update_type: UpdateType,
    /// When the catalog was last checked
    pub last_check: Option<DateTime<Utc>>,
}

/// What the device is running, for an "about" screen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Device (board) name
    pub device: String,
    /// Installed version with any build suffix removed
    pub installed_version: String,
    /// When the catalog was last checked
    pub last_check: Option<DateTime<Utc>>,
}

/// Counters exposed for observability
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    /// Progress polls issued to the engine
    pub polls: u64,
    /// Anomalies: lost handles, filename or checksum mismatches
    pub anomalies: u64,
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A download was enqueued (or adopted) and its identity persisted
    DownloadStarted {
        /// Engine handle
        handle: DownloadHandle,
        /// The record being downloaded
        record: UpdateRecord,
    },

    /// Progress poll result
    Progress {
        /// Engine handle
        handle: DownloadHandle,
        /// Bytes received so far
        bytes_downloaded: u64,
        /// Total size (None = indeterminate)
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_total: Option<u64>,
    },

    /// The artifact arrived and is ready to hand off
    DownloadCompleted {
        /// Engine handle
        handle: DownloadHandle,
        /// Artifact file name
        file_name: String,
        /// Final artifact path
        path: PathBuf,
    },

    /// The download failed
    DownloadFailed {
        /// Engine handle
        handle: DownloadHandle,
        /// Expected file name, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        /// Why it failed
        reason: String,
    },

    /// The download was cancelled; the record should revert to "new"
    DownloadCancelled {
        /// Engine handle
        handle: DownloadHandle,
        /// File name of the cancelled record
        file_name: String,
    },

    /// Progress polling stopped without a state change
    PollStopped {
        /// Engine handle
        handle: DownloadHandle,
        /// Why polling stopped
        reason: String,
    },

    /// A reconciliation pass finished
    CatalogRefreshed {
        /// Number of server-only records
        server_only: usize,
        /// Number of local artifacts
        local: usize,
    },

    /// The orchestrator is shutting down
    Shutdown,
}
