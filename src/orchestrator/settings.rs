//! Persisted check settings and system information.

use crate::error::Result;
use crate::platform::device_name;
use crate::types::{SystemInfo, UpdateSettings, UpdateType};
use chrono::{DateTime, TimeZone, Utc};

use super::DownloadOrchestrator;

impl DownloadOrchestrator {
    /// Current settings, falling back to configured defaults for unset values
    pub async fn settings(&self) -> Result<UpdateSettings> {
        let state = self.db.load_state().await?;
        let defaults = &self.config.checks;

        Ok(UpdateSettings {
            check_frequency_secs: state
                .check_frequency_secs
                .unwrap_or(defaults.check_frequency_secs),
            update_type: state
                .update_type_filter
                .map(UpdateType::from_i32)
                .unwrap_or(defaults.update_type),
            last_check: state.last_check_timestamp.and_then(millis_to_datetime),
        })
    }

    /// Persist the automatic check interval in seconds (0 or negative disables it)
    pub async fn set_check_frequency(&self, seconds: i64) -> Result<()> {
        self.db.set_check_frequency(seconds).await?;
        tracing::debug!(seconds, "check frequency updated");
        Ok(())
    }

    /// Persist the update channel filter
    pub async fn set_update_type(&self, update_type: UpdateType) -> Result<()> {
        self.db.set_update_type(update_type).await?;
        tracing::debug!(?update_type, "update type updated");
        Ok(())
    }

    /// Record that the catalog was checked at `at`
    pub async fn record_check(&self, at: DateTime<Utc>) -> Result<()> {
        self.db.set_last_check(at.timestamp_millis()).await
    }

    /// Device, installed version and last check time
    pub async fn system_info(&self) -> Result<SystemInfo> {
        let device = device_name(
            self.collaborators.platform.as_ref(),
            &self.config.platform.device_property,
        )
        .await;
        let installed_version = self.installed_version().await;
        let last_check = self.settings().await?.last_check;

        Ok(SystemInfo {
            device,
            installed_version,
            last_check,
        })
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
