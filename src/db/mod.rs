//! Database layer for update-stager
//!
//! Handles SQLite persistence of the active download identity and the
//! update-check settings so an in-flight download survives a restart.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`session`] - Active download identity and check settings
//! - [`state`] - Runtime state key/value access and shutdown tracking

use crate::types::DownloadHandle;
use sqlx::sqlite::SqlitePool;

mod migrations;
mod session;
mod state;

/// Keys of the `runtime_state` table
pub(crate) mod keys {
    /// Engine handle of the active download
    pub const ACTIVE_DOWNLOAD_HANDLE: &str = "active_download_handle";
    /// Expected checksum of the active download
    pub const ACTIVE_MD5: &str = "active_md5";
    /// File name of the active download
    pub const ACTIVE_FILE_NAME: &str = "active_file_name";
    /// Epoch millis of the last catalog check
    pub const LAST_CHECK_TIMESTAMP: &str = "last_check_timestamp";
    /// Seconds between automatic checks
    pub const CHECK_FREQUENCY_SECS: &str = "check_frequency_secs";
    /// Update channel filter (integer enum)
    pub const UPDATE_TYPE_FILTER: &str = "update_type_filter";
    /// "true" once the previous process shut down cleanly
    pub const CLEAN_SHUTDOWN: &str = "clean_shutdown";
}

/// Everything that survives a process restart
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Engine handle of the in-flight download, if any
    pub active_download_handle: Option<DownloadHandle>,
    /// Expected checksum of the in-flight download
    pub active_md5: Option<String>,
    /// File name of the in-flight download
    pub active_file_name: Option<String>,
    /// Epoch millis of the last catalog check
    pub last_check_timestamp: Option<i64>,
    /// Seconds between automatic checks
    pub check_frequency_secs: Option<i64>,
    /// Update channel filter (integer enum)
    pub update_type_filter: Option<i32>,
}

/// Database handle for update-stager
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
