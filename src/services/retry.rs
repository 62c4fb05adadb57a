use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy with exponential backoff.
///
/// Backoff doubles per attempt from `initial_backoff_ms`, capped at `max_backoff_ms`.
/// Whether an error is worth retrying is decided per call by the caller's predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 10_000,
        }
    }
}

/// Final result of a retried operation and how many times it ran.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// Backoff before retry number `attempt + 1`: `min(initial * 2^attempt, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    /// Run `operation` until it succeeds, returns an error `should_retry` rejects, or the
    /// retry budget is spent. Only the last error is returned.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(result),
                        attempts: attempt + 1,
                    };
                }
                Err(err) if attempt < self.max_retries && should_retry(&err) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempts = attempt + 1, error = %err, "Giving up");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt + 1,
                    };
                }
            }
        }
    }
}
