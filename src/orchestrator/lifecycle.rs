//! Startup and shutdown coordination.

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::store::ArtifactStore;
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    Collaborators, Counters, DownloadOrchestrator, EVENT_CHANNEL_CAPACITY, SessionSlot, poller,
};

impl DownloadOrchestrator {
    /// Create a new DownloadOrchestrator
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Sets up the event broadcast channel
    /// - Reattaches to a download that was in flight when the previous process exited
    pub async fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;

        if db.was_unclean_shutdown().await? {
            tracing::info!("previous session did not shut down cleanly");
        }
        // Mark that we're starting up (for unclean shutdown detection)
        db.set_clean_start().await?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            engine = collaborators.engine.name(),
            platform = collaborators.platform.name(),
            updates_dir = %config.store.updates_dir.display(),
            "update orchestrator initialized"
        );

        let orchestrator = Self {
            db: Arc::new(db),
            event_tx,
            store: ArtifactStore::from_config(&config.store),
            config: Arc::new(config),
            collaborators,
            slot: Arc::new(tokio::sync::Mutex::new(SessionSlot::default())),
            poll: Arc::new(std::sync::Mutex::new(poller::PollControl::default())),
            counters: Arc::new(Counters::default()),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        };

        orchestrator.recover_session().await?;

        Ok(orchestrator)
    }

    /// Gracefully shut down the orchestrator
    ///
    /// Stops accepting new downloads, stops every progress poller and marks a
    /// clean shutdown. The in-flight transfer is left running in the engine; its
    /// identity stays persisted so the next process reattaches to it.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new downloads are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
