//! Fixed-delay retry policy.
//!
//! Report builds and database connections are retried with a constant delay.
//! In production both run with no attempt limit; tests use a bounded policy
//! or a paused tokio clock to observe the schedule without waiting.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Retry an operation with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    /// `None` retries forever
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry until the operation succeeds.
    pub const fn forever(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` attempts (at least one attempt is made).
    pub const fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    /// Run `op` until it succeeds or the policy is exhausted.
    ///
    /// `op` receives the 1-based attempt number. Every failure is logged with
    /// the operation name; the last error is returned only by bounded policies.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_described(operation, |e: &E| format!("{operation} failed: {e}"), op)
            .await
    }

    /// Like [`run`](Self::run), with each failure logged once as the line
    /// `describe` produces.
    pub async fn run_described<T, E, F, Fut, D>(
        &self,
        operation: &str,
        describe: D,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: Fn(&E) -> String,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if self.exhausted(attempt) => {
                    error!(operation, attempt, "{}. Giving up", describe(&e));
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        operation,
                        attempt,
                        retry_in_secs = self.delay.as_secs(),
                        "{}. Retrying...",
                        describe(&e)
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
