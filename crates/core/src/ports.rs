//! Collaborator seams of a sync run. Concrete implementations live in
//! `pricepost-db` (tables, run lock) and `pricepost-telegram` (messaging).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::cell::Cell;
use crate::domain::chat::{ChatId, InlineKeyboard};
use crate::domain::directory::MessageId;
use crate::domain::table::{Row, Table};
use crate::errors::{DeliveryError, StoreError};

#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Every row of the named table, header first. `None` when the table does not exist.
    async fn read_all(&self, table: &str) -> Result<Option<Table>, StoreError>;

    /// Overwrites `rows.len()` rows starting at `start_row` (0 is the header row).
    async fn write_range(&self, table: &str, start_row: usize, rows: &[Row])
        -> Result<(), StoreError>;

    async fn append_row(&self, table: &str, row: &Row) -> Result<(), StoreError>;

    /// Creates the table with the given header row when it is missing or empty.
    /// Returns `true` when the header row was written.
    async fn ensure_table(&self, table: &str, headers: &[&str]) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send(
        &self,
        chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId, DeliveryError>;

    async fn edit(&self, chat: &ChatId, message_id: MessageId, text: &str)
        -> Result<(), DeliveryError>;

    async fn delete(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError>;

    async fn pin(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError>;

    async fn unpin(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError>;
}

/// Cross-process run flag. A held flag older than `stale_after` may be taken over.
#[async_trait]
pub trait RunLockStore: Send + Sync {
    async fn try_acquire(&self, key: &str, stale_after: Duration) -> Result<bool, StoreError>;
    async fn release(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Cell>, StoreError>;
    /// `None` clears the value.
    async fn set(&self, key: &str, value: Option<Cell>) -> Result<(), StoreError>;
}
