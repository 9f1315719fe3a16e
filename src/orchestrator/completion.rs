//! Completion signal handling and hand-off to the installer.

use crate::error::{DownloadError, Result};
use crate::types::{DownloadHandle, Event, SessionState};
use crate::utils::{checksums_match, file_name_of, md5_file, strip_partial_suffix};
use std::path::{Path, PathBuf};

use super::{DownloadOrchestrator, SessionSlot};

impl DownloadOrchestrator {
    /// Handle the engine's completion signal for `handle`
    ///
    /// The session becomes `Completed` once the reported file is verified and
    /// its `.partial` destination renamed to the final name. It becomes
    /// `Failed` when the file name differs from the expected one, the file lies
    /// outside the updates directory or the checksum does not match. Persisted
    /// state is kept until [`acknowledge`](Self::acknowledge), so a crash right
    /// after completion is still recoverable.
    ///
    /// Returns the resulting session state.
    ///
    /// # Errors
    ///
    /// [`DownloadError::NotRunning`] when no download is running and
    /// [`DownloadError::HandleMismatch`] when the signal is for another handle.
    /// Neither changes the session.
    pub async fn complete(&self, handle: DownloadHandle, final_path: &Path) -> Result<SessionState> {
        let mut slot = self.slot.lock().await;

        let active = match (slot.session.state, slot.session.handle) {
            (SessionState::Downloading, Some(active)) => active,
            _ => return Err(DownloadError::NotRunning.into()),
        };
        if active != handle {
            return Err(DownloadError::HandleMismatch {
                expected: active,
                actual: handle,
            }
            .into());
        }

        self.stop_poller();
        let state = self.finish_session(&mut slot, handle, final_path).await;
        Ok(state)
    }

    /// Verify the artifact and move the session to a terminal state
    ///
    /// The reported file must sit directly in the updates directory and carry
    /// the session's file name, otherwise it is left untouched. The checksum is
    /// verified before the `.partial` is renamed; a file that fails it is
    /// discarded together with its sidecar so it never shows up as local.
    pub(crate) async fn finish_session(
        &self,
        slot: &mut SessionSlot,
        handle: DownloadHandle,
        reported_path: &Path,
    ) -> SessionState {
        let reported = file_name_of(reported_path)
            .map(strip_partial_suffix)
            .map(str::to_string);
        let expected = slot.session.file_name.clone();

        let file_name = match (expected, reported) {
            (Some(expected), Some(reported)) if expected == reported => expected,
            (None, Some(reported)) => reported,
            (expected, reported) => {
                self.record_anomaly();
                let expected = expected.unwrap_or_else(|| "<none>".to_string());
                let reported = reported.unwrap_or_else(|| "<none>".to_string());
                tracing::warn!(
                    handle = handle.0,
                    expected = %expected,
                    actual = %reported,
                    "completed file does not match the requested update"
                );
                return self.fail_session(
                    slot,
                    handle,
                    format!("downloaded file {reported} does not match expected {expected}"),
                );
            }
        };

        if !self.store.contains(reported_path).await {
            self.record_anomaly();
            tracing::warn!(
                handle = handle.0,
                path = %reported_path.display(),
                dir = %self.store.dir().display(),
                "completed file is outside the updates directory"
            );
            return self.fail_session(
                slot,
                handle,
                format!(
                    "downloaded file {} is outside {}",
                    reported_path.display(),
                    self.store.dir().display()
                ),
            );
        }

        if self.config.download.verify_md5 && !slot.session.md5.is_empty() {
            // The engine may already have renamed the file itself
            let candidate = match tokio::fs::try_exists(reported_path).await {
                Ok(true) => reported_path.to_path_buf(),
                _ => self.store.artifact_path(&file_name),
            };
            match md5_file(&candidate).await {
                Ok(digest) if checksums_match(&slot.session.md5, &digest) => {}
                Ok(digest) => {
                    self.record_anomaly();
                    tracing::warn!(
                        handle = handle.0,
                        expected = %slot.session.md5,
                        actual = %digest,
                        "checksum mismatch on completed download"
                    );
                    self.store.discard(&file_name).await;
                    let reason =
                        format!("checksum mismatch: expected {}, got {}", slot.session.md5, digest);
                    return self.fail_session(slot, handle, reason);
                }
                Err(e) => {
                    return self.fail_session(
                        slot,
                        handle,
                        format!("failed to checksum {}: {}", candidate.display(), e),
                    );
                }
            }
        }

        let final_path = match self.store.promote_partial(reported_path).await {
            Ok(path) => path,
            Err(e) => {
                return self.fail_session(
                    slot,
                    handle,
                    format!("failed to finalize {}: {}", reported_path.display(), e),
                );
            }
        };

        if let Some(total) = slot.session.bytes_total {
            slot.session.bytes_downloaded = total;
        }
        slot.session.state = SessionState::Completed;
        slot.session.final_path = Some(final_path.clone());

        tracing::info!(handle = handle.0, file_name = %file_name, "download completed");
        self.emit_event(Event::DownloadCompleted {
            handle,
            file_name,
            path: final_path,
        });
        SessionState::Completed
    }

    /// Move the session to `Failed` and notify subscribers
    pub(crate) fn fail_session(
        &self,
        slot: &mut SessionSlot,
        handle: DownloadHandle,
        reason: String,
    ) -> SessionState {
        tracing::warn!(handle = handle.0, reason = %reason, "download failed");
        slot.session.state = SessionState::Failed;
        slot.session.failure_reason = Some(reason.clone());
        self.emit_event(Event::DownloadFailed {
            handle,
            file_name: slot.session.file_name.clone(),
            reason,
        });
        SessionState::Failed
    }

    /// Copy a downloaded artifact to the installer staging path
    ///
    /// The cached copy is removed from the updates directory. Staging the
    /// artifact of a completed session also acknowledges that session.
    /// Rebooting into the installer is left to the caller.
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidState`] while `file_name` belongs to a download
    /// that is still running or has failed, store errors otherwise.
    pub async fn stage(&self, file_name: &str) -> Result<PathBuf> {
        let mut slot = self.slot.lock().await;
        let owned_by_session = slot.session.file_name.as_deref() == Some(file_name);

        if owned_by_session
            && matches!(
                slot.session.state,
                SessionState::Downloading | SessionState::Failed
            )
        {
            return Err(DownloadError::InvalidState {
                operation: "stage".to_string(),
                current_state: slot.session.state.to_string(),
            }
            .into());
        }

        let staged = self
            .store
            .stage(file_name, &self.config.store.staging_path)
            .await?;
        slot.catalog.local.retain(|r| r.file_name != file_name);

        if owned_by_session && slot.session.state == SessionState::Completed {
            self.db.clear_active_download().await?;
            slot.reset();
        }

        Ok(staged)
    }
}
