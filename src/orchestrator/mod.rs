//! Download orchestration split into focused submodules.
//!
//! The `DownloadOrchestrator` struct and its methods are organized by domain:
//! - [`control`] - Start, adopt, cancel and acknowledge a download
//! - [`completion`] - Completion signal handling and hand-off to the installer
//! - [`recovery`] - Reattaching to an in-flight download after a restart
//! - [`poller`] - Observer-scoped progress polling
//! - [`catalog_ops`] - Catalog refresh and artifact deletion
//! - [`settings`] - Persisted check settings and system information
//! - [`lifecycle`] - Startup and shutdown coordination

mod catalog_ops;
mod completion;
mod control;
mod lifecycle;
mod poller;
mod recovery;
mod settings;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use poller::ProgressObserver;

use crate::config::Config;
use crate::db::Database;
use crate::engine::{ConnectivityProbe, DownloadEngine};
use crate::platform::PlatformInfo;
use crate::store::ArtifactStore;
use crate::types::{CatalogView, DownloadSession, Event, OrchestratorStats, UpdateRecord};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Buffer size of the event broadcast channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// External collaborators the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    /// Performs the byte transfer
    pub engine: Arc<dyn DownloadEngine>,
    /// Consulted before a download is started
    pub connectivity: Arc<dyn ConnectivityProbe>,
    /// Source of the device name and installed version
    pub platform: Arc<dyn PlatformInfo>,
}

/// Everything guarded by the session lock
#[derive(Debug, Default)]
pub(crate) struct SessionSlot {
    /// The single download session
    pub(crate) session: DownloadSession,
    /// Record the active session was started for
    pub(crate) record: Option<UpdateRecord>,
    /// View produced by the last catalog refresh
    pub(crate) catalog: CatalogView,
}

impl SessionSlot {
    /// Reset the session to idle
    pub(crate) fn reset(&mut self) {
        self.session = DownloadSession::default();
        self.record = None;
    }

    /// Whether `file_name` belongs to a download that is running or awaiting acknowledgement
    pub(crate) fn owns_file(&self, file_name: &str) -> bool {
        use crate::types::SessionState;
        matches!(
            self.session.state,
            SessionState::Downloading | SessionState::Completed
        ) && self.session.file_name.as_deref() == Some(file_name)
    }
}

/// Observability counters
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) polls: AtomicU64,
    pub(crate) anomalies: AtomicU64,
}

/// Owner of the download session (cloneable - all fields are Arc-wrapped)
///
/// At most one download is in flight at any time. Its identity is persisted
/// before any operation that starts it returns, so it can be recovered after a
/// restart.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    /// Database instance for persistence (public for integration tests)
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Updates directory access
    pub(crate) store: ArtifactStore,
    /// External collaborators
    pub(crate) collaborators: Collaborators,
    /// Session, active record and cached catalog
    pub(crate) slot: Arc<tokio::sync::Mutex<SessionSlot>>,
    /// Progress poller bookkeeping
    pub(crate) poll: Arc<std::sync::Mutex<poller::PollControl>>,
    /// Poll and anomaly counters
    pub(crate) counters: Arc<Counters>,
    /// Cleared during shutdown; no new downloads are accepted afterwards
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled during shutdown; parent of every poller token
    pub(crate) shutdown_token: tokio_util::sync::CancellationToken,
}

impl DownloadOrchestrator {
    /// Subscribe to orchestrator events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently; dropping the receiver unsubscribes.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use update_stager::{Collaborators, Config, DownloadOrchestrator};
    ///
    /// # async fn example(collaborators: Collaborators) -> update_stager::Result<()> {
    /// let orchestrator = DownloadOrchestrator::new(Config::default(), collaborators).await?;
    ///
    /// let mut events = orchestrator.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "update event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The artifact store used by this orchestrator
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Snapshot of the download session
    pub async fn session(&self) -> DownloadSession {
        self.slot.lock().await.session.clone()
    }

    /// Poll and anomaly counters
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            polls: self.counters.polls.load(Ordering::Relaxed),
            anomalies: self.counters.anomalies.load(Ordering::Relaxed),
        }
    }

    /// Count an anomaly (lost handle, filename or checksum mismatch)
    pub(crate) fn record_anomaly(&self) {
        self.counters.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
