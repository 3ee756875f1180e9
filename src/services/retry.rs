//! Bounded retry with exponential backoff for calls to external collaborators.
//!
//! Retrying only changes how hard a side effect is attempted; it never feeds
//! back into grouping.

use crate::services::ports::ServiceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-indexed). Zero for attempt 0.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Final result of a retried call
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, ServiceError>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt + 1,
                }
            }
            Err(e) if attempt < config.max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = config.calculate_delay(attempt);
                tracing::warn!("{} failed (attempt {}), retrying in {:?}: {}", label, attempt, delay, e);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(e) => {
                return Retried {
                    result: Err(e),
                    attempts: attempt + 1,
                }
            }
        }
    }
}
