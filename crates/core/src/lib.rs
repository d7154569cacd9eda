pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod lock;
pub mod ports;
pub mod pricing;
pub mod retry;
pub mod settings;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::cell::Cell;
pub use domain::chat::{ChatId, InlineKeyboard, LinkButton};
pub use domain::directory::{DirectoryEntry, GroupStatus, MessageId};
pub use domain::table::{Row, Table};
pub use errors::{ApplicationError, DeliveryError, DomainError, StoreError};
pub use ports::{MessagingClient, RunLockStore, SettingsStore, TabularStore};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy, Retryable};
pub use sync::{PriceSync, RunOutcome, RunReport};
