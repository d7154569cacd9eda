use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use pricepost_core::errors::StoreError;
use pricepost_core::ports::RunLockStore;

use super::RepositoryError;
use crate::DbPool;

const RUNNING: &str = "running";
const IDLE: &str = "idle";

/// Run flag kept in the `run_lock` table. Acquisition is a single conditional
/// upsert, so two processes cannot both take an idle or stale flag.
pub struct SqlRunLockStore {
    pool: DbPool,
}

impl SqlRunLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn acquire(&self, key: &str, stale_after: Duration) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        // An unrepresentable window means the flag never goes stale; '' sorts first.
        let stale_before = chrono::Duration::from_std(stale_after)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO run_lock (name, status, acquired_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                status = excluded.status,
                acquired_at = excluded.acquired_at
             WHERE run_lock.status != ?
                OR run_lock.acquired_at IS NULL
                OR run_lock.acquired_at < ?",
        )
        .bind(key)
        .bind(RUNNING)
        .bind(now.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(RUNNING)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE run_lock SET status = ?, acquired_at = NULL WHERE name = ?")
            .bind(IDLE)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RunLockStore for SqlRunLockStore {
    async fn try_acquire(&self, key: &str, stale_after: Duration) -> Result<bool, StoreError> {
        Ok(self.acquire(key, stale_after).await?)
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        Ok(self.clear(key).await?)
    }
}
