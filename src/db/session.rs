//! Active download identity and update-check settings.
//!
//! The active download keys are always written and cleared together inside
//! one transaction, so a restart sees either the whole identity or none of it.

use crate::error::DatabaseError;
use crate::types::{DownloadHandle, UpdateType};
use crate::{Error, Result};

use super::{Database, PersistedState, keys};

fn parse_i64(key: &str, value: Option<String>) -> Option<i64> {
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring malformed runtime state value");
            None
        }
    }
}

impl Database {
    /// Load everything persisted across restarts
    pub async fn load_state(&self) -> Result<PersistedState> {
        let handle = parse_i64(
            keys::ACTIVE_DOWNLOAD_HANDLE,
            self.get_value(keys::ACTIVE_DOWNLOAD_HANDLE).await?,
        );
        let update_type = parse_i64(
            keys::UPDATE_TYPE_FILTER,
            self.get_value(keys::UPDATE_TYPE_FILTER).await?,
        );

        Ok(PersistedState {
            active_download_handle: handle.map(DownloadHandle),
            active_md5: self.get_value(keys::ACTIVE_MD5).await?,
            active_file_name: self.get_value(keys::ACTIVE_FILE_NAME).await?,
            last_check_timestamp: parse_i64(
                keys::LAST_CHECK_TIMESTAMP,
                self.get_value(keys::LAST_CHECK_TIMESTAMP).await?,
            ),
            check_frequency_secs: parse_i64(
                keys::CHECK_FREQUENCY_SECS,
                self.get_value(keys::CHECK_FREQUENCY_SECS).await?,
            ),
            update_type_filter: update_type.and_then(|v| i32::try_from(v).ok()),
        })
    }

    /// Persist the identity of a newly started download
    ///
    /// Handle, checksum and file name are committed in one transaction before
    /// this returns.
    pub async fn persist_active_download(
        &self,
        handle: DownloadHandle,
        md5: &str,
        file_name: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        Self::upsert_value(&mut tx, keys::ACTIVE_DOWNLOAD_HANDLE, &handle.to_string()).await?;
        Self::upsert_value(&mut tx, keys::ACTIVE_MD5, md5).await?;
        Self::upsert_value(&mut tx, keys::ACTIVE_FILE_NAME, file_name).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to persist active download: {}",
                e
            )))
        })?;

        tracing::debug!(handle = handle.0, file_name, "persisted active download");
        Ok(())
    }

    /// Forget the active download
    pub async fn clear_active_download(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        Self::delete_value(&mut tx, keys::ACTIVE_DOWNLOAD_HANDLE).await?;
        Self::delete_value(&mut tx, keys::ACTIVE_MD5).await?;
        Self::delete_value(&mut tx, keys::ACTIVE_FILE_NAME).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to clear active download: {}",
                e
            )))
        })?;

        tracing::debug!("cleared active download");
        Ok(())
    }

    /// Persist the automatic check interval
    pub async fn set_check_frequency(&self, seconds: i64) -> Result<()> {
        self.set_value(keys::CHECK_FREQUENCY_SECS, &seconds.to_string())
            .await
    }

    /// Persist the update channel filter
    pub async fn set_update_type(&self, update_type: UpdateType) -> Result<()> {
        self.set_value(keys::UPDATE_TYPE_FILTER, &update_type.to_i32().to_string())
            .await
    }

    /// Persist the time of the last catalog check (epoch millis)
    pub async fn set_last_check(&self, epoch_millis: i64) -> Result<()> {
        self.set_value(keys::LAST_CHECK_TIMESTAMP, &epoch_millis.to_string())
            .await
    }
}
