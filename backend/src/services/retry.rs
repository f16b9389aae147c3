//! Bounded retry for whole ledger transactions
//!
//! Only transient storage faults are retried. A transaction that failed before
//! commit left nothing behind, so running it again from the start is safe.

use std::future::Future;
use std::time::Duration;

use crate::error::AppResult;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = just the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on exponential growth
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// exhausts the retry budget.
pub async fn run_transaction<F, Fut, T>(
    config: &RetryConfig,
    context: &str,
    operation: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(context, attempts, "Transaction succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempts <= config.max_retries => {
                let delay = config.delay_for_attempt(attempts - 1);
                tracing::warn!(
                    context,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient storage fault, retrying transaction"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(context, attempts, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
