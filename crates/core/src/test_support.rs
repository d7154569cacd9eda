//! In-process fakes for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::cell::Cell;
use crate::domain::chat::{ChatId, InlineKeyboard};
use crate::domain::directory::MessageId;
use crate::domain::table::{Row, Table};
use crate::errors::{DeliveryError, StoreError};
use crate::ports::{MessagingClient, RunLockStore, TabularStore};

pub fn row(cells: &[&str]) -> Row {
    cells.iter().map(|cell| if cell.is_empty() { Cell::Empty } else { Cell::text(*cell) }).collect()
}

#[derive(Default)]
pub struct MemoryTables {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    read_timeouts: AtomicU32,
    failing_appends: RwLock<HashSet<String>>,
    writes: AtomicU32,
}

impl MemoryTables {
    pub async fn insert(&self, table: &str, rows: Vec<Row>) {
        self.tables.write().await.insert(table.to_owned(), rows);
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// The next `count` reads fail with a timeout.
    pub fn time_out_reads(&self, count: u32) {
        self.read_timeouts.store(count, Ordering::SeqCst);
    }

    pub async fn fail_appends_to(&self, table: &str) {
        self.failing_appends.write().await.insert(table.to_owned());
    }

    pub fn range_writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TabularStore for MemoryTables {
    async fn read_all(&self, table: &str) -> Result<Option<Table>, StoreError> {
        let pending = self.read_timeouts.load(Ordering::SeqCst);
        if pending > 0 {
            self.read_timeouts.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Timeout(format!("read {table}")));
        }
        Ok(self.tables.read().await.get(table).cloned().map(Table::new))
    }

    async fn write_range(&self, table: &str, start_row: usize, rows: &[Row]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_owned()).or_default();
        if stored.len() < start_row + rows.len() {
            stored.resize(start_row + rows.len(), Vec::new());
        }
        for (offset, row) in rows.iter().enumerate() {
            stored[start_row + offset] = row.clone();
        }
        Ok(())
    }

    async fn append_row(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        if self.failing_appends.read().await.contains(table) {
            return Err(StoreError::Backend(format!("append to {table} refused")));
        }
        self.tables.write().await.entry(table.to_owned()).or_default().push(row.clone());
        Ok(())
    }

    async fn ensure_table(&self, table: &str, headers: &[&str]) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_owned()).or_default();
        if !stored.is_empty() {
            return Ok(false);
        }
        stored.push(headers.iter().map(|header| Cell::text(*header)).collect());
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Send { message_id: MessageId, text: String, buttons: Vec<(String, String)> },
    Edit { message_id: MessageId, text: String },
    Delete(MessageId),
    Pin(MessageId),
    Unpin(MessageId),
}

/// Records every call; methods listed with [`RecordingMessenger::fail`] are rejected.
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    next_id: AtomicI64,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::starting_at(1_000)
    }
}

impl RecordingMessenger {
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            next_id: AtomicI64::new(first_id),
        }
    }

    pub async fn fail(&self, method: &'static str) {
        self.failing.lock().await.insert(method);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    async fn check(&self, method: &'static str) -> Result<(), DeliveryError> {
        if self.failing.lock().await.contains(method) {
            return Err(DeliveryError::Api {
                method: method.to_owned(),
                description: "Bad Request: scripted failure".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for RecordingMessenger {
    async fn send(
        &self,
        _chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId, DeliveryError> {
        self.check("sendMessage").await?;
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let buttons = keyboard
            .map(|keyboard| {
                keyboard.buttons().map(|button| (button.text.clone(), button.url.clone())).collect()
            })
            .unwrap_or_default();
        self.calls.lock().await.push(Call::Send { message_id, text: text.to_owned(), buttons });
        Ok(message_id)
    }

    async fn edit(&self, _chat: &ChatId, message_id: MessageId, text: &str) -> Result<(), DeliveryError> {
        self.check("editMessageText").await?;
        self.calls.lock().await.push(Call::Edit { message_id, text: text.to_owned() });
        Ok(())
    }

    async fn delete(&self, _chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        self.check("deleteMessage").await?;
        self.calls.lock().await.push(Call::Delete(message_id));
        Ok(())
    }

    async fn pin(&self, _chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        self.check("pinChatMessage").await?;
        self.calls.lock().await.push(Call::Pin(message_id));
        Ok(())
    }

    async fn unpin(&self, _chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        self.check("unpinChatMessage").await?;
        self.calls.lock().await.push(Call::Unpin(message_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLock {
    held: Mutex<HashSet<String>>,
    releases: AtomicU32,
}

impl MemoryLock {
    pub async fn hold(&self, key: &str) {
        self.held.lock().await.insert(key.to_owned());
    }

    pub async fn is_held(&self, key: &str) -> bool {
        self.held.lock().await.contains(key)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunLockStore for MemoryLock {
    async fn try_acquire(&self, key: &str, _stale_after: Duration) -> Result<bool, StoreError> {
        Ok(self.held.lock().await.insert(key.to_owned()))
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.held.lock().await.remove(key);
        Ok(())
    }
}
