use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{AppConfig, SheetsConfig};
use crate::domain::table::{Row, Table};
use crate::errors::StoreError;
use crate::ports::TabularStore;
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy, Retryable};
use crate::settings::SETTINGS_HEADERS;

/// Retries store calls that time out; every other store error surfaces at once.
pub struct RetryingStore {
    inner: Arc<dyn TabularStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn TabularStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn from_config(inner: Arc<dyn TabularStore>, sheets: &SheetsConfig) -> Self {
        Self::new(
            inner,
            RetryPolicy::fixed(sheets.retry_attempts, Duration::from_millis(sheets.retry_delay_ms)),
        )
    }
}

fn classify(error: &StoreError) -> Retryable {
    if error.is_timeout() {
        Retryable::Yes
    } else {
        Retryable::No
    }
}

#[async_trait]
impl TabularStore for RetryingStore {
    async fn read_all(&self, table: &str) -> Result<Option<Table>, StoreError> {
        let inner = &self.inner;
        retry_with_backoff("store.read_all", &self.policy, move |_| inner.read_all(table), classify)
            .await
            .map_err(RetryError::into_inner)
    }

    async fn write_range(&self, table: &str, start_row: usize, rows: &[Row]) -> Result<(), StoreError> {
        let inner = &self.inner;
        retry_with_backoff(
            "store.write_range",
            &self.policy,
            move |_| inner.write_range(table, start_row, rows),
            classify,
        )
        .await
        .map_err(RetryError::into_inner)
    }

    async fn append_row(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let inner = &self.inner;
        retry_with_backoff("store.append_row", &self.policy, move |_| inner.append_row(table, row), classify)
            .await
            .map_err(RetryError::into_inner)
    }

    async fn ensure_table(&self, table: &str, headers: &[&str]) -> Result<bool, StoreError> {
        let inner = &self.inner;
        retry_with_backoff(
            "store.ensure_table",
            &self.policy,
            move |_| inner.ensure_table(table, headers),
            classify,
        )
        .await
        .map_err(RetryError::into_inner)
    }
}

/// Creates the directory and settings tables with their header rows if needed.
pub async fn ensure_system_tables(
    store: &dyn TabularStore,
    config: &AppConfig,
) -> Result<(), StoreError> {
    let directory_names = config.columns.directory_names();
    let systems = [
        (config.sheets.directory.as_str(), directory_names.headers()),
        (config.sheets.settings.as_str(), SETTINGS_HEADERS.to_vec()),
    ];

    for (table, headers) in systems {
        if store.ensure_table(table, &headers).await? {
            info!(event_name = "sync.tables.created", table, "created system table");
        }
    }
    Ok(())
}
