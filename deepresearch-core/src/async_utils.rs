//! Retry, timeout and ordered concurrency helpers for network calls

use crate::error::{ErrorContext, ResearchError, ResearchResult};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Exponential backoff policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry that follows `attempt` (1-based), without jitter
    pub fn delay_for_attempt(&self, attempt: usize) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        (delay as u64).min(self.max_delay_ms)
    }

    /// [`Self::delay_for_attempt`] spread by up to 10% when jitter is on
    fn sleep_for(&self, attempt: usize) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let millis = if self.jitter {
            let spread = (fastrand::f64() * 2.0 - 1.0) * 0.1;
            (base as f64 * (1.0 + spread)) as u64
        } else {
            base
        };
        Duration::from_millis(millis)
    }
}

/// Retry `operation` with exponential backoff on any error
pub async fn retry_async<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_async_when(operation, config, operation_name, |_| true).await
}

/// Retry `operation` with exponential backoff while `should_retry` accepts the
/// error. The last error is returned once attempts run out.
pub async fn retry_async_when<F, Fut, T, E, P>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded on retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if attempt == max_attempts || !should_retry(&error) {
            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                error = %error,
                "giving up"
            );
            return Err(error);
        }

        let pause = config.sleep_for(attempt);
        debug!(
            operation = operation_name,
            attempt,
            delay_ms = pause.as_millis() as u64,
            error = %error,
            "retrying"
        );
        sleep(pause).await;
        attempt += 1;
    }
}

/// Fail with [`ResearchError::Timeout`] when `future` outlives `timeout_ms`
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> ResearchResult<T>
where
    F: Future<Output = T>,
{
    timeout(Duration::from_millis(timeout_ms), future)
        .await
        .map_err(|_| ResearchError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new(operation_name)
                .with_operation("await")
                .with_metadata("timeout_ms", timeout_ms)
                .with_suggestion("Raise the timeout in the configuration"),
        })
}

/// Run `processor` over `items` with at most `max_concurrent` in flight.
///
/// Results come back in input order regardless of completion order.
pub async fn process_in_order<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    processor: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(processor)
        .buffered(max_concurrent.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(1), 1000);
        assert_eq!(config.delay_for_attempt(2), 2000);
        assert_eq!(config.delay_for_attempt(3), 4000);
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig {
            max_delay_ms: 1500,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(4), 1500);
    }
}
