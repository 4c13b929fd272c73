//! Retry driver with exponential backoff and jitter
//!
//! Executes a fallible operation up to a bounded number of attempts,
//! sleeping per the backoff policy between attempts and honoring a
//! cancellation token at every suspension point.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::backoff;
use crate::error::{Error, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 16;
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_millis(128);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// Tunable retry bounds. Multiple folders with different tuning coexist;
/// nothing here is process-global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so `max_retries + 1` attempts total.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Ceiling for any single sleep interval.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

/// Stateless retry driver; concurrent `run` calls are independent.
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails permanently, exhausts the
    /// attempt budget, or `cancel` fires.
    ///
    /// The operation may mutably borrow outer state (an open remote
    /// writer, a part list); each attempt completes before the next
    /// begins. No per-attempt timeout is imposed here; the cancellation
    /// token, typically a deadline, bounds the whole invocation.
    pub async fn run<T, F>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: AsyncFnMut() -> Result<T>,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.policy.max_retries => {
                    return Err(Error::RetryExhausted {
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }
                Err(err) => err,
            };

            let delay = {
                let mut rng = rand::rng();
                backoff::sleep_interval(&self.policy, attempt, &mut rng)
            };
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient failure"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Aborts the deadline timer task when the guarded operation completes.
#[derive(Debug)]
pub struct DeadlineGuard {
    timer: tokio::task::JoinHandle<()>,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Token that fires after `timeout`, bounding one folder operation.
pub fn deadline_token(timeout: Duration) -> (CancellationToken, DeadlineGuard) {
    let token = CancellationToken::new();
    let armed = token.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        armed.cancel();
    });
    (token, DeadlineGuard { timer })
}

/// Bounds a single non-retried call by the folder's context timeout.
pub async fn with_deadline<T, F>(timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Cancelled),
    }
}
