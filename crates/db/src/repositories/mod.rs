use pricepost_core::errors::StoreError;
use thiserror::Error;

pub mod run_lock;
pub mod sheet;

pub use run_lock::SqlRunLockStore;
pub use sheet::SqlSheetStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// Pool exhaustion and SQLite lock contention clear up on their own.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            Self::Database(sqlx::Error::Database(error)) => {
                let message = error.message();
                message.contains("database is locked") || message.contains("database is busy")
            }
            _ => false,
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        if error.is_timeout() {
            return Self::Timeout(error.to_string());
        }
        match error {
            RepositoryError::Decode(message) => Self::Decode(message),
            other => Self::Backend(other.to_string()),
        }
    }
}
