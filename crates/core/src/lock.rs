use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::LockConfig;
use crate::errors::ApplicationError;
use crate::ports::RunLockStore;

/// Scoped run lock: the body only runs while the flag is held, and the flag is
/// released after the body finishes whether it succeeded or not.
#[derive(Clone)]
pub struct RunLock {
    store: Arc<dyn RunLockStore>,
    key: String,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(store: Arc<dyn RunLockStore>, key: impl Into<String>, stale_after: Duration) -> Self {
        Self { store, key: key.into(), stale_after }
    }

    pub fn from_config(store: Arc<dyn RunLockStore>, config: &LockConfig) -> Self {
        Self::new(store, config.key.clone(), Duration::from_secs(config.stale_after_secs))
    }

    /// `Ok(None)` when another run holds the lock; the body is not started.
    pub async fn run<T, F>(&self, body: F) -> Result<Option<T>, ApplicationError>
    where
        F: Future<Output = Result<T, ApplicationError>>,
    {
        let acquired = self
            .store
            .try_acquire(&self.key, self.stale_after)
            .await
            .map_err(|error| ApplicationError::Lock(error.to_string()))?;
        if !acquired {
            warn!(event_name = "sync.lock.busy", key = %self.key, "another run holds the lock");
            return Ok(None);
        }
        info!(event_name = "sync.lock.acquired", key = %self.key, "run lock acquired");

        let outcome = body.await;

        match self.store.release(&self.key).await {
            Ok(()) => info!(event_name = "sync.lock.released", key = %self.key, "run lock released"),
            Err(release_error) => error!(
                event_name = "sync.lock.release_failed",
                key = %self.key,
                error = %release_error,
                "failed to release run lock"
            ),
        }

        outcome.map(Some)
    }
}
