//! Download lifecycle control: start, adopt, cancel, acknowledge.

use crate::engine::DownloadRequest;
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadHandle, DownloadSession, Event, SessionState, UpdateRecord};
use crate::utils::validate_file_name;

use super::{DownloadOrchestrator, SessionSlot};

impl DownloadOrchestrator {
    /// Start downloading a server-origin record
    ///
    /// The engine request is enqueued and its handle persisted before this
    /// returns. The changelog sidecar is written first, best-effort.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::AlreadyRunning`] if a download is in flight (the
    ///   running session is left untouched)
    /// - [`DownloadError::InvalidState`] if a finished session has not been
    ///   acknowledged yet
    /// - [`DownloadError::Offline`] if no network path is usable
    /// - [`DownloadError::NotDownloadable`] / [`Error::InvalidUrl`] for records
    ///   without a usable URL
    /// - [`StoreError::InvalidFileName`](crate::error::StoreError::InvalidFileName)
    ///   when the record's file name would leave the updates directory; nothing
    ///   is written or enqueued
    /// - engine or database errors; if persisting fails the engine request is
    ///   removed again so no untracked transfer is left behind
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use update_stager::*;
    /// # async fn example(orchestrator: DownloadOrchestrator, record: UpdateRecord) -> Result<()> {
    /// let handle = orchestrator.start(record).await?;
    /// println!("downloading as {handle}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(&self, record: UpdateRecord) -> Result<DownloadHandle> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let mut slot = self.slot.lock().await;
        Self::check_can_begin(&slot, "start")?;

        if !self.collaborators.connectivity.is_online() {
            return Err(DownloadError::Offline.into());
        }

        let request =
            DownloadRequest::for_record(&record, self.store.dir(), &self.config.download)?;

        self.store.ensure_dir().await?;
        if !record.changelog.is_empty()
            && let Err(e) = self
                .store
                .write_changelog(&record.file_name, &record.changelog)
                .await
        {
            tracing::warn!(file_name = %record.file_name, error = %e, "failed to write changelog sidecar");
        }

        let handle = self.collaborators.engine.enqueue(request).await?;

        if let Err(e) = self
            .db
            .persist_active_download(handle, &record.md5, &record.file_name)
            .await
        {
            tracing::error!(handle = handle.0, error = %e, "failed to persist download, removing it from the engine");
            if let Err(remove_err) = self.collaborators.engine.remove(handle).await {
                tracing::warn!(handle = handle.0, error = %remove_err, "failed to remove unpersisted download");
            }
            return Err(e);
        }

        slot.session =
            DownloadSession::downloading(handle, record.file_name.clone(), record.md5.clone());
        slot.record = Some(record.clone());
        drop(slot);

        tracing::info!(handle = handle.0, file_name = %record.file_name, "download started");
        self.emit_event(Event::DownloadStarted { handle, record });
        self.ensure_poller();

        Ok(handle)
    }

    /// Take over a download another producer already enqueued with the engine
    ///
    /// Same single-download rule and persist-before-return guarantee as
    /// [`start`](Self::start), without the connectivity check or enqueue.
    pub async fn adopt_download(
        &self,
        handle: DownloadHandle,
        record: UpdateRecord,
    ) -> Result<()> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        validate_file_name(&record.file_name)?;

        let mut slot = self.slot.lock().await;
        Self::check_can_begin(&slot, "adopt")?;

        self.db
            .persist_active_download(handle, &record.md5, &record.file_name)
            .await?;

        slot.session =
            DownloadSession::downloading(handle, record.file_name.clone(), record.md5.clone());
        slot.record = Some(record.clone());
        drop(slot);

        tracing::info!(handle = handle.0, file_name = %record.file_name, "adopted running download");
        self.emit_event(Event::DownloadStarted { handle, record });
        self.ensure_poller();

        Ok(())
    }

    /// Cancel the running download
    ///
    /// Confirmation is the caller's concern. The engine request is removed
    /// (a failure there is logged and ignored), persisted state is cleared and
    /// the session returns to idle. Subscribers receive
    /// [`Event::DownloadCancelled`] so the record can be shown as new again.
    pub async fn cancel(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let (handle, file_name) = match (&slot.session.state, slot.session.handle) {
            (SessionState::Downloading, Some(handle)) => {
                (handle, slot.session.file_name.clone().unwrap_or_default())
            }
            _ => return Err(DownloadError::NotRunning.into()),
        };

        if let Err(e) = self.collaborators.engine.remove(handle).await {
            tracing::warn!(handle = handle.0, error = %e, "engine failed to remove cancelled download");
        }
        self.stop_poller();

        self.db.clear_active_download().await?;
        slot.reset();
        drop(slot);

        tracing::info!(handle = handle.0, file_name = %file_name, "download cancelled");
        self.emit_event(Event::DownloadCancelled { handle, file_name });

        Ok(())
    }

    /// Return a finished session to idle and clear persisted state
    ///
    /// Acknowledging an idle session is a no-op.
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidState`] while a download is still running.
    pub async fn acknowledge(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        match slot.session.state {
            SessionState::Idle => Ok(()),
            SessionState::Downloading => Err(DownloadError::InvalidState {
                operation: "acknowledge".to_string(),
                current_state: slot.session.state.to_string(),
            }
            .into()),
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed => {
                self.db.clear_active_download().await?;
                tracing::debug!(state = %slot.session.state, "session acknowledged");
                slot.reset();
                Ok(())
            }
        }
    }

    fn check_can_begin(slot: &SessionSlot, operation: &str) -> Result<()> {
        match slot.session.state {
            SessionState::Idle => Ok(()),
            SessionState::Downloading => Err(DownloadError::AlreadyRunning {
                file_name: slot.session.file_name.clone().unwrap_or_default(),
            }
            .into()),
            state => Err(DownloadError::InvalidState {
                operation: operation.to_string(),
                current_state: state.to_string(),
            }
            .into()),
        }
    }
}
