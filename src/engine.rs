//! External collaborators: the download engine and the connectivity probe
//!
//! The byte transfer itself happens outside this crate. The orchestrator only
//! enqueues requests, polls them by handle and removes them.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadHandle, UpdateRecord};
use crate::utils::{PARTIAL_SUFFIX, validate_file_name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A transfer request handed to the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Source URL
    pub url: url::Url,
    /// Request headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// Where the engine writes the bytes (`<file>.partial` inside the updates directory)
    pub destination: PathBuf,
    /// Notification title
    pub title: String,
    /// Notification description
    pub description: String,
}

impl DownloadRequest {
    /// Build the request for a server-origin record
    ///
    /// # Errors
    ///
    /// [`DownloadError::NotDownloadable`] when the record has no URL,
    /// [`StoreError::InvalidFileName`](crate::error::StoreError::InvalidFileName)
    /// when its file name is not a plain file name, and [`Error::InvalidUrl`]
    /// when the URL does not parse.
    pub fn for_record(
        record: &UpdateRecord,
        updates_dir: &Path,
        download: &DownloadConfig,
    ) -> Result<Self> {
        let raw_url =
            record
                .download_url
                .as_deref()
                .ok_or_else(|| DownloadError::NotDownloadable {
                    file_name: record.file_name.clone(),
                })?;
        validate_file_name(&record.file_name)?;

        let url = url::Url::parse(raw_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", raw_url, e)))?;

        Ok(Self {
            url,
            headers: vec![
                ("Cache-Control".to_string(), "no-cache".to_string()),
                ("User-Agent".to_string(), download.user_agent()),
            ],
            destination: updates_dir.join(format!("{}{}", record.file_name, PARTIAL_SUFFIX)),
            title: download.app_name.clone(),
            description: record.file_name.clone(),
        })
    }

    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Engine-side state of a transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Waiting to start
    Pending,
    /// Transferring
    Running,
    /// Paused by the engine (e.g. waiting for network)
    Paused,
    /// Finished successfully
    Successful,
    /// Finished with an error
    Failed,
}

/// Result of an engine query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineStatus {
    /// Bytes received so far
    pub bytes_downloaded: u64,
    /// Total size, `None` while unknown
    pub bytes_total: Option<u64>,
    /// Transfer state
    pub state: EngineState,
    /// Where the engine is writing, when it reports it
    pub local_path: Option<PathBuf>,
}

/// The download engine that performs the actual byte transfer
///
/// Implementations can wrap a platform download service, an HTTP client or
/// a scripted fake for tests.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Enqueue a transfer and return its handle
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadHandle>;

    /// Current status of a transfer, `None` when the handle is unknown
    async fn query(&self, handle: DownloadHandle) -> Result<Option<EngineStatus>>;

    /// Remove a transfer (and whatever it wrote so far)
    async fn remove(&self, handle: DownloadHandle) -> Result<()>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}

/// Answers whether a network path is usable right now
pub trait ConnectivityProbe: Send + Sync {
    /// True when a download could proceed
    fn is_online(&self) -> bool;
}

/// Connectivity flag pushed by the host when the network changes
///
/// Cloning shares the flag.
#[derive(Clone, Debug)]
pub struct ManualConnectivity {
    online: Arc<AtomicBool>,
}

impl ManualConnectivity {
    /// Create a probe with the given initial state
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// Update the flag
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
