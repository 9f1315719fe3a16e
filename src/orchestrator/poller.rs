//! Observer-scoped progress polling.
//!
//! Polling runs only while at least one [`ProgressObserver`] is alive and the
//! session is downloading. Stopping the poller never touches the transfer in the
//! engine.

use crate::engine::EngineState;
use crate::types::{DownloadHandle, Event};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use super::DownloadOrchestrator;

/// Poller bookkeeping shared with observer guards
#[derive(Debug, Default)]
pub(crate) struct PollControl {
    /// Live observer guards
    observers: usize,
    /// Generation and stop token of the running poller
    active: Option<(u64, CancellationToken)>,
    next_generation: u64,
}

fn lock(control: &Mutex<PollControl>) -> MutexGuard<'_, PollControl> {
    control.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps progress polling alive while held
///
/// Obtained from [`DownloadOrchestrator::observe`]. Dropping the last guard
/// stops polling; the download itself keeps running.
#[must_use = "polling stops as soon as the observer is dropped"]
#[derive(Debug)]
pub struct ProgressObserver {
    control: Arc<Mutex<PollControl>>,
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        let mut control = lock(&self.control);
        control.observers = control.observers.saturating_sub(1);
        if control.observers == 0
            && let Some((generation, token)) = control.active.take()
        {
            tracing::debug!(generation, "last observer gone, pausing progress polling");
            token.cancel();
        }
    }
}

/// What the poller does after one poll
enum PollOutcome {
    Continue,
    Stop,
}

impl DownloadOrchestrator {
    /// Register interest in progress updates
    ///
    /// Must be called from within a tokio runtime. Progress arrives as
    /// [`Event::Progress`] on [`subscribe`](Self::subscribe) receivers.
    pub fn observe(&self) -> ProgressObserver {
        lock(&self.poll).observers += 1;
        self.ensure_poller();
        ProgressObserver {
            control: Arc::clone(&self.poll),
        }
    }

    /// Spawn the poller if someone is observing and none is running
    ///
    /// The poller exits on its own when the session is not downloading.
    pub(crate) fn ensure_poller(&self) {
        let (generation, token) = {
            let mut control = lock(&self.poll);
            if control.observers == 0 || control.active.is_some() {
                return;
            }
            control.next_generation += 1;
            let generation = control.next_generation;
            let token = self.shutdown_token.child_token();
            control.active = Some((generation, token.clone()));
            (generation, token)
        };

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_poller(generation, token).await;
        });
    }

    /// Stop the running poller, if any
    pub(crate) fn stop_poller(&self) {
        if let Some((_, token)) = lock(&self.poll).active.take() {
            token.cancel();
        }
    }

    async fn run_poller(&self, generation: u64, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.download.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!(generation, "progress poller started");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    if let PollOutcome::Stop = self.poll_once().await {
                        break;
                    }
                }
            }
        }

        let mut control = lock(&self.poll);
        if matches!(control.active, Some((active, _)) if active == generation) {
            control.active = None;
        }
        tracing::debug!(generation, "progress poller stopped");
    }

    async fn poll_once(&self) -> PollOutcome {
        let handle = {
            let slot = self.slot.lock().await;
            match slot.session.handle {
                Some(handle) if slot.session.is_downloading() => handle,
                _ => return PollOutcome::Stop,
            }
        };

        self.counters.polls.fetch_add(1, Ordering::Relaxed);

        match self.collaborators.engine.query(handle).await {
            Ok(Some(status)) => {
                let mut slot = self.slot.lock().await;
                // The session may have moved on while the engine was queried
                if slot.session.handle != Some(handle) || !slot.session.is_downloading() {
                    return PollOutcome::Stop;
                }
                slot.session.bytes_downloaded = status.bytes_downloaded;
                slot.session.bytes_total = status.bytes_total;
                drop(slot);

                self.emit_event(Event::Progress {
                    handle,
                    bytes_downloaded: status.bytes_downloaded,
                    bytes_total: status.bytes_total,
                });

                if matches!(status.state, EngineState::Successful | EngineState::Failed) {
                    self.terminal_unconfirmed(handle, status.state);
                    return PollOutcome::Stop;
                }
                PollOutcome::Continue
            }
            Ok(None) => {
                self.handle_lost(handle);
                PollOutcome::Stop
            }
            Err(e) => {
                tracing::warn!(handle = handle.0, error = %e, "progress query failed, retrying next tick");
                PollOutcome::Continue
            }
        }
    }

    /// The engine finished the transfer but no completion signal arrived yet
    ///
    /// The session stays `Downloading` until [`complete`](Self::complete) or
    /// [`cancel`](Self::cancel) is called.
    fn terminal_unconfirmed(&self, handle: DownloadHandle, state: EngineState) {
        self.record_anomaly();
        tracing::warn!(
            handle = handle.0,
            engine_state = ?state,
            anomaly = "unconfirmed_terminal_state",
            "download engine reports a finished transfer without a completion signal, polling stopped"
        );
        self.emit_event(Event::PollStopped {
            handle,
            reason: format!("download engine reports {state:?} but completion was not signalled"),
        });
    }

    /// The engine no longer knows the handle; stop polling without a state change
    fn handle_lost(&self, handle: DownloadHandle) {
        self.record_anomaly();
        tracing::warn!(
            handle = handle.0,
            anomaly = "engine_handle_unknown",
            "download engine lost track of the active download, polling stopped"
        );
        self.emit_event(Event::PollStopped {
            handle,
            reason: "download engine has no record of this handle".to_string(),
        });
    }
}
