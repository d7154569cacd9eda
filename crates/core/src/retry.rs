use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// How a failed attempt should be treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retryable {
    /// Give up immediately and surface the error.
    No,
    /// Retry after the policy's own delay.
    Yes,
    /// Retry after a wait mandated by the remote side (policy padding is added).
    After(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub mandated_padding: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            mandated_padding: Duration::ZERO,
        }
    }

    /// Only waits the remote side asks for are retried; padding is added to each.
    pub fn mandated(max_attempts: u32, padding: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            mandated_padding: padding,
        }
    }

    /// Delay before the next attempt.
    pub fn delay_for(&self, verdict: Retryable) -> Duration {
        match verdict {
            Retryable::After(wait) => wait.saturating_add(self.mandated_padding),
            Retryable::No | Retryable::Yes => self.base_delay,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error(transparent)]
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } | Self::Permanent(last) => last,
        }
    }
}

/// Runs `operation` until it succeeds, `classify` says the error is permanent, or
/// `policy.max_attempts` attempts have been made. The attempt number (1-based) is
/// passed to the operation.
pub async fn retry_with_backoff<T, E, Op, Fut, C>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: Op,
    classify: C,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> Retryable,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let verdict = classify(&error);
        if verdict == Retryable::No {
            return Err(RetryError::Permanent(error));
        }
        if attempt >= max_attempts {
            warn!(
                event_name = "system.retry.exhausted",
                operation = label,
                attempts = attempt,
                error = %error,
                "retries exhausted"
            );
            return Err(RetryError::Exhausted { attempts: attempt, last: error });
        }

        let delay = policy.delay_for(verdict);
        warn!(
            event_name = "system.retry.scheduled",
            operation = label,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "attempt failed; retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
