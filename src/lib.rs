//! # update-stager
//!
//! Backend library for system update clients: reconciles the server update
//! catalog with downloaded artifacts and drives a single, restart-safe download.
//!
//! ## Design Philosophy
//!
//! update-stager is designed to be:
//! - **One download at a time** - A second start is rejected, never queued
//! - **Restart-safe** - The active download is persisted before `start` returns
//!   and reattached on the next launch
//! - **Library-first** - The byte transfer, network probe and property service
//!   are traits supplied by the host
//! - **Event-driven** - Consumers subscribe to events; progress is only polled
//!   while someone observes it
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use update_stager::{
//!     Collaborators, Config, DownloadOrchestrator, GetpropPlatform, ManualConnectivity,
//!     UpdateCatalog,
//! };
//!
//! # async fn example(
//! #     engine: Arc<dyn update_stager::DownloadEngine>,
//! #     catalog: UpdateCatalog,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let platform = GetpropPlatform::from_path().ok_or("getprop not found")?;
//! let collaborators = Collaborators {
//!     engine,
//!     connectivity: Arc::new(ManualConnectivity::new(true)),
//!     platform: Arc::new(platform),
//! };
//! let orchestrator = DownloadOrchestrator::new(Config::default(), collaborators).await?;
//!
//! let view = orchestrator.refresh_catalog(catalog).await?;
//! if let Some(newest) = view.server_only.first() {
//!     let _observer = orchestrator.observe();
//!     orchestrator.start(newest.clone()).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog reconciliation
pub mod catalog;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Download engine and connectivity seams
pub mod engine;
/// Error types
pub mod error;
/// Download orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Device properties
pub mod platform;
/// Obsolete artifact retention
pub mod retention;
/// Local artifact store
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Version string comparison
pub mod version;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use engine::{
    ConnectivityProbe, DownloadEngine, DownloadRequest, EngineState, EngineStatus,
    ManualConnectivity,
};
pub use error::{DatabaseError, DownloadError, Error, Result, StoreError, VersionParseError};
pub use orchestrator::{Collaborators, DownloadOrchestrator, ProgressObserver};
pub use platform::{GetpropPlatform, PlatformInfo, StaticPlatform};
pub use retention::RetentionPolicy;
pub use store::{ArtifactListing, ArtifactStore};
pub use types::{
    CatalogEntry, CatalogView, DownloadHandle, DownloadSession, Event, OrchestratorStats,
    RecordOrigin, RecordStatus, SessionState, SystemInfo, UpdateCatalog, UpdateRecord,
    UpdateSettings, UpdateType,
};
pub use version::compare_versions;

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's `shutdown()` method.
/// A running download is left to the engine and reattached on the next start.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use update_stager::{Collaborators, Config, DownloadOrchestrator, run_with_shutdown};
///
/// # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = DownloadOrchestrator::new(Config::default(), collaborators).await?;
///
/// // Run with automatic signal handling
/// run_with_shutdown(orchestrator).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(orchestrator: DownloadOrchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
