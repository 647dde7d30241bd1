use crate::error::{FgaError, Result};
use backoff::{future::retry_notify, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry policy for idempotent reads against the authorization service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_wait: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            min_wait: Duration::ZERO,
        }
    }

    /// Delays double from `min_wait` up to 30 seconds, with 25% jitter
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.min_wait,
            initial_interval: self.min_wait,
            randomization_factor: 0.25,
            multiplier: 2.0,
            max_interval: MAX_BACKOFF,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `f`, retrying retryable failures up to `max_retries` times
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.max_retries;
        let mut attempt: u32 = 0;

        let attempt_once = || {
            let call = f();
            let last = attempt >= max_retries;
            attempt = attempt.saturating_add(1);
            async move {
                call.await.map_err(|err| {
                    if !last && err.is_retryable() {
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        };
        let log_retry = |err: FgaError, delay: Duration| {
            warn!(
                operation,
                max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retrying authorization request"
            );
        };

        retry_notify(self.schedule(), attempt_once, log_retry).await
    }
}
