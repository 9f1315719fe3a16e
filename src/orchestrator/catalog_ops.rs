//! Catalog refresh and artifact deletion.

use crate::catalog;
use crate::error::{DownloadError, Result};
use crate::platform::{UNKNOWN_VERSION, installed_version};
use crate::retention::RetentionPolicy;
use crate::types::{CatalogEntry, CatalogView, Event, SessionState, UpdateCatalog};

use super::DownloadOrchestrator;

impl DownloadOrchestrator {
    /// Reconcile a freshly fetched catalog with the updates directory
    ///
    /// Obsolete local artifacts are pruned when retention is enabled and the
    /// installed version is known. Local records get their changelog from the
    /// sidecar. The result is cached (see [`catalog`](Self::catalog)) and
    /// announced with [`Event::CatalogRefreshed`].
    pub async fn refresh_catalog(&self, catalog: UpdateCatalog) -> Result<CatalogView> {
        let installed = self.installed_version().await;

        let mut prune = self.config.retention.delete_obsolete;
        if prune && installed == UNKNOWN_VERSION {
            tracing::debug!("installed version unknown, skipping obsolete pruning");
            prune = false;
        }

        let mut view = catalog::reconcile(
            catalog.into_records(),
            &self.store,
            &installed,
            RetentionPolicy::new(prune),
        )
        .await?;

        for record in &mut view.local {
            record.changelog = self
                .store
                .read_changelog_or_placeholder(&record.file_name)
                .await;
        }

        self.slot.lock().await.catalog = view.clone();

        self.emit_event(Event::CatalogRefreshed {
            server_only: view.server_only.len(),
            local: view.local.len(),
        });
        Ok(view)
    }

    /// The view produced by the last refresh
    pub async fn catalog(&self) -> CatalogView {
        self.slot.lock().await.catalog.clone()
    }

    /// The cached view with a status for every row
    pub async fn catalog_entries(&self) -> Vec<CatalogEntry> {
        let installed = self.installed_version().await;
        let slot = self.slot.lock().await;
        let active = if slot.session.is_downloading() {
            slot.session.file_name.as_deref()
        } else {
            None
        };
        slot.catalog
            .classify(active, &installed, &self.config.store.artifact_extension)
    }

    /// Delete one downloaded artifact and its changelog
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidState`] for the artifact of the running or
    /// unacknowledged download; store errors (not found, directory missing)
    /// otherwise.
    pub async fn delete_artifact(&self, file_name: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.owns_file(file_name) {
            return Err(DownloadError::InvalidState {
                operation: "delete".to_string(),
                current_state: slot.session.state.to_string(),
            }
            .into());
        }

        self.store.delete(file_name).await?;
        slot.catalog.local.retain(|r| r.file_name != file_name);
        Ok(())
    }

    /// Clear the updates directory
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidState`] while a download is running or awaiting
    /// acknowledgement, since its file lives in the same directory.
    pub async fn delete_all_artifacts(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if matches!(
            slot.session.state,
            SessionState::Downloading | SessionState::Completed
        ) {
            return Err(DownloadError::InvalidState {
                operation: "delete all".to_string(),
                current_state: slot.session.state.to_string(),
            }
            .into());
        }

        self.store.delete_all().await?;
        slot.catalog.local.clear();
        Ok(())
    }

    pub(crate) async fn installed_version(&self) -> String {
        installed_version(
            self.collaborators.platform.as_ref(),
            &self.config.platform.version_property,
        )
        .await
    }
}
