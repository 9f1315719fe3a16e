//! Reattaching to an in-flight download after a restart.

use crate::engine::{EngineState, EngineStatus};
use crate::error::{DownloadError, Result};
use crate::types::{DownloadSession, Event, SessionState};
use crate::utils::{file_name_of, strip_partial_suffix};

use super::DownloadOrchestrator;

impl DownloadOrchestrator {
    /// Restore the session from persisted state
    ///
    /// The persisted handle is looked up in the engine:
    /// - unknown handle: the session is `Failed` and persisted state is cleared
    /// - engine reports success: the completion path runs (verification included)
    /// - engine reports failure: the session is `Failed`, awaiting acknowledgement
    /// - anything else: the session resumes `Downloading`
    ///
    /// A failing engine query is treated as "still downloading"; the poller
    /// keeps asking.
    pub(crate) async fn recover_session(&self) -> Result<()> {
        let persisted = self.db.load_state().await?;
        let Some(handle) = persisted.active_download_handle else {
            return Ok(());
        };

        tracing::info!(handle = handle.0, "recovering download from previous session");

        let status = match self.collaborators.engine.query(handle).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                self.record_anomaly();
                let error = DownloadError::EngineHandleUnknown { handle };
                tracing::warn!(
                    handle = handle.0,
                    anomaly = "engine_handle_unknown",
                    error = %error,
                    "persisted download is unknown to the engine"
                );
                self.slot.lock().await.session = DownloadSession {
                    handle: Some(handle),
                    file_name: persisted.active_file_name.clone(),
                    md5: persisted.active_md5.unwrap_or_default(),
                    state: SessionState::Failed,
                    failure_reason: Some(error.to_string()),
                    ..Default::default()
                };
                self.db.clear_active_download().await?;
                self.emit_event(Event::DownloadFailed {
                    handle,
                    file_name: persisted.active_file_name,
                    reason: error.to_string(),
                });
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(handle = handle.0, error = %e, "engine query failed during recovery, assuming download continues");
                EngineStatus {
                    bytes_downloaded: 0,
                    bytes_total: None,
                    state: EngineState::Running,
                    local_path: None,
                }
            }
        };

        let mut slot = self.slot.lock().await;

        // Prefer the persisted name; fall back to what the engine is writing
        let file_name = persisted.active_file_name.or_else(|| {
            status
                .local_path
                .as_deref()
                .and_then(file_name_of)
                .map(|name| strip_partial_suffix(name).to_string())
        });

        let mut session = DownloadSession {
            handle: Some(handle),
            file_name: file_name.clone(),
            md5: persisted.active_md5.unwrap_or_default(),
            bytes_downloaded: status.bytes_downloaded,
            bytes_total: status.bytes_total,
            state: SessionState::Downloading,
            ..Default::default()
        };

        match status.state {
            EngineState::Successful => {
                slot.session = session;
                let reported = status.local_path.clone().or_else(|| {
                    file_name
                        .as_deref()
                        .map(|name| self.store.partial_path(name))
                });
                match reported {
                    Some(path) => {
                        let state = self.finish_session(&mut slot, handle, &path).await;
                        tracing::info!(handle = handle.0, state = %state, "recovered finished download");
                    }
                    None => {
                        self.fail_session(
                            &mut slot,
                            handle,
                            "finished download has no known location".to_string(),
                        );
                    }
                }
            }
            EngineState::Failed => {
                session.state = SessionState::Failed;
                session.failure_reason = Some("download engine reported failure".to_string());
                slot.session = session;
                tracing::info!(handle = handle.0, "recovered failed download");
                self.emit_event(Event::DownloadFailed {
                    handle,
                    file_name,
                    reason: "download engine reported failure".to_string(),
                });
            }
            EngineState::Pending | EngineState::Running | EngineState::Paused => {
                slot.session = session;
                drop(slot);
                tracing::info!(handle = handle.0, "resumed in-flight download");
                self.ensure_poller();
            }
        }

        Ok(())
    }
}
