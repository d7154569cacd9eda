use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::cell::Cell;
use crate::domain::directory::MessageId;
use crate::errors::StoreError;
use crate::ports::{SettingsStore, TabularStore};

pub const SETTINGS_HEADERS: [&str; 2] = ["Key", "Value"];
pub const NAV_MESSAGE_ID_KEY: &str = "nav_message_id";

/// Key/value settings kept in a two-column table (`Key`, `Value`).
pub struct SheetSettingsStore {
    store: Arc<dyn TabularStore>,
    table: String,
}

impl SheetSettingsStore {
    pub fn new(store: Arc<dyn TabularStore>, table: impl Into<String>) -> Self {
        Self { store, table: table.into() }
    }

    /// Row index (header = 0) of the first row whose key matches.
    async fn find_row(&self, key: &str) -> Result<Option<(usize, Option<Cell>)>, StoreError> {
        let Some(table) = self.store.read_all(&self.table).await? else {
            return Ok(None);
        };

        let found = table.data_rows().iter().enumerate().find_map(|(offset, row)| {
            let row_key = row.first().and_then(Cell::as_label)?;
            (row_key == key).then(|| (offset + 1, row.get(1).cloned()))
        });
        Ok(found)
    }
}

#[async_trait]
impl SettingsStore for SheetSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Cell>, StoreError> {
        let value = self.find_row(key).await?.and_then(|(_, value)| value);
        Ok(value.filter(|cell| !cell.is_blank()))
    }

    async fn set(&self, key: &str, value: Option<Cell>) -> Result<(), StoreError> {
        let row = vec![Cell::text(key), value.unwrap_or_default()];
        match self.find_row(key).await? {
            Some((row_index, _)) => {
                debug!(event_name = "store.settings.overwrite", key, row_index, "overwriting setting");
                self.store.write_range(&self.table, row_index, &[row]).await
            }
            None => {
                debug!(event_name = "store.settings.append", key, "appending setting");
                self.store.append_row(&self.table, &row).await
            }
        }
    }
}

/// Typed access to the persisted navigation message id. The navigation
/// rebuild is the only writer.
#[derive(Clone)]
pub struct NavigationRecord {
    settings: Arc<dyn SettingsStore>,
}

impl NavigationRecord {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// A stored value that is not an integer reads as absent.
    pub async fn load(&self) -> Result<Option<MessageId>, StoreError> {
        let value = self.settings.get(NAV_MESSAGE_ID_KEY).await?;
        Ok(value.as_ref().and_then(MessageId::from_cell))
    }

    pub async fn save(&self, message_id: Option<MessageId>) -> Result<(), StoreError> {
        self.settings.set(NAV_MESSAGE_ID_KEY, message_id.map(MessageId::to_cell)).await
    }
}
