//! Runtime state tracking: key/value access and shutdown detection.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;

use super::{Database, keys};

impl Database {
    /// Read one runtime_state value
    pub(crate) async fn get_value(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read runtime state '{}': {}",
                    key, e
                )))
            })
    }

    /// Insert or replace one runtime_state value
    pub(crate) async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;
        Self::upsert_value(&mut conn, key, value).await
    }

    /// Insert or replace one runtime_state value on an existing connection
    pub(crate) async fn upsert_value(
        conn: &mut SqliteConnection,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Remove one runtime_state value on an existing connection
    pub(crate) async fn delete_value(conn: &mut SqliteConnection, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM runtime_state WHERE key = ?")
            .bind(key)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear runtime state '{}': {}",
                    key, e
                )))
            })?;

        Ok(())
    }

    /// Check if the last shutdown was unclean
    ///
    /// Returns true if the previous session did not call set_clean_shutdown(),
    /// indicating a crash or forced termination.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value = self.get_value(keys::CLEAN_SHUTDOWN).await?;

        // If the value is missing or "false", it was an unclean shutdown
        Ok(value.is_none_or(|v| v != "true"))
    }

    /// Mark that the orchestrator has started
    ///
    /// If set_clean_shutdown() is not called before the next startup,
    /// was_unclean_shutdown() will return true.
    pub async fn set_clean_start(&self) -> Result<()> {
        self.set_value(keys::CLEAN_SHUTDOWN, "false").await
    }

    /// Mark that the orchestrator is shutting down cleanly
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.set_value(keys::CLEAN_SHUTDOWN, "true").await
    }
}
