//! Bounded retry with a fixed pause between attempts.
//!
//! Used for every read that touches the chain. Writes are never routed
//! through here: resubmitting a rejected or reverted transaction is unsafe.

use crate::error::ChainError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Retries a fallible async call up to `max_attempts` times.
#[derive(Debug, Clone, Copy)]
pub struct RetryingCaller {
    max_attempts: u32,
    interval: Duration,
}

impl RetryingCaller {
    /// Create a caller. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Run `f` until it succeeds or the attempt budget is spent.
    ///
    /// Fails with [`ChainError::ExhaustedRetries`] carrying the last error.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempts_left = self.max_attempts;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts_left -= 1;
                    if attempts_left == 0 {
                        debug!(operation, attempts = self.max_attempts, error = %e, "Retries exhausted");
                        return Err(ChainError::ExhaustedRetries {
                            operation: operation.to_string(),
                            attempts: self.max_attempts,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        operation,
                        attempts_left,
                        error = %e,
                        "Retrying chain call"
                    );
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
