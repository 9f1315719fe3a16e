//! Error types for update-stager
//!
//! This module provides error handling for the library:
//! - Domain-specific error types (Download, Store, Database, version parsing)
//! - Machine-readable error codes for front-ends that map errors to messages
//! - Context information (file name, handle, path) on every variant that has one
//!
//! Nothing in this crate is fatal to the host process. Every error can be
//! recovered from by returning the session to idle and reconciling again.

use crate::types::DownloadHandle;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for update-stager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for update-stager
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "store.updates_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Malformed version string
    #[error("version error: {0}")]
    Version(#[from] VersionParseError),

    /// Download session error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Artifact store error
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    /// The external download engine rejected or failed a request
    #[error("download engine error: {0}")]
    Engine(String),

    /// A record carried a download URL that does not parse
    #[error("invalid download URL: {0}")]
    InvalidUrl(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// A version string contained a component that is not an integer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed version '{input}': component '{component}' is not numeric")]
pub struct VersionParseError {
    /// The version string as passed to the comparator (suffix already stripped)
    pub input: String,
    /// The offending dot-separated component
    pub component: String,
}

/// Download session errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No usable network path when a download was requested
    #[error("a data connection is required to download updates")]
    Offline,

    /// A download is already in progress; only one may run at a time
    #[error("a download is already running ({file_name})")]
    AlreadyRunning {
        /// File name of the download that is currently running
        file_name: String,
    },

    /// The operation needs a running download but the session is not downloading
    #[error("no download is running")]
    NotRunning,

    /// Cannot perform operation in the current session state
    #[error("cannot {operation} while session is {current_state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "start", "acknowledge")
        operation: String,
        /// The current session state that prevents the operation
        current_state: String,
    },

    /// The record has no download URL (it is a local artifact)
    #[error("update {file_name} has no download URL")]
    NotDownloadable {
        /// File name of the record
        file_name: String,
    },

    /// A completion signal arrived for a handle other than the active one
    #[error("completion for handle {actual} does not match active handle {expected}")]
    HandleMismatch {
        /// Handle of the active session
        expected: DownloadHandle,
        /// Handle carried by the completion signal
        actual: DownloadHandle,
    },

    /// The download engine no longer knows a handle this system believes is active
    #[error("download engine has no record of handle {handle}")]
    EngineHandleUnknown {
        /// The handle the engine lost track of
        handle: DownloadHandle,
    },
}

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The artifact to delete does not exist
    #[error("update {file_name} not found")]
    ArtifactNotFound {
        /// File name that was requested
        file_name: String,
    },

    /// The updates directory does not exist (nothing to show, not a failure)
    #[error("updates directory {path} does not exist")]
    DirectoryMissing {
        /// The expected updates directory
        path: PathBuf,
    },

    /// Clearing the updates directory left entries behind
    #[error("failed to delete {} entries while clearing updates directory", failures.len())]
    DeleteIncomplete {
        /// Every entry that could not be removed, with the reason
        failures: Vec<(PathBuf, String)>,
    },

    /// A file name that is not a single plain path component
    #[error("invalid update file name {file_name:?}")]
    InvalidFileName {
        /// The rejected name
        file_name: String,
    },
}

impl Error {
    /// Machine-readable error code
    ///
    /// Front-ends can use this to pick a user-facing message without matching
    /// on the full error tree.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Version(_) => "version_parse_error",
            Error::Download(e) => match e {
                DownloadError::Offline => "offline",
                DownloadError::AlreadyRunning { .. } => "already_running",
                DownloadError::NotRunning => "not_running",
                DownloadError::InvalidState { .. } => "invalid_state",
                DownloadError::NotDownloadable { .. } => "not_downloadable",
                DownloadError::HandleMismatch { .. } => "handle_mismatch",
                DownloadError::EngineHandleUnknown { .. } => "engine_handle_unknown",
            },
            Error::Store(e) => match e {
                StoreError::ArtifactNotFound { .. } => "artifact_not_found",
                StoreError::DirectoryMissing { .. } => "directory_missing",
                StoreError::DeleteIncomplete { .. } => "delete_incomplete",
                StoreError::InvalidFileName { .. } => "invalid_file_name",
            },
            Error::Engine(_) => "engine_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether the error is an expected, user-facing condition rather than a
    /// malfunction (offline, already running, nothing to delete, ...)
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::Download(
                DownloadError::Offline
                    | DownloadError::AlreadyRunning { .. }
                    | DownloadError::NotRunning
            ) | Error::Store(
                StoreError::ArtifactNotFound { .. } | StoreError::DirectoryMissing { .. }
            )
        )
    }

    /// Whether the error should stop the host process
    ///
    /// Always false: every condition is recovered by returning to idle.
    pub fn is_fatal(&self) -> bool {
        false
    }
}
