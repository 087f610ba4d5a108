//! Retry with exponential backoff for transient failures.
//!
//! Only errors that [`SyncError::is_transient`] accepts are retried. A 404 or a
//! schema error fails on the first attempt.

use crate::utils::errors::SyncError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff settings for a single call site.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }
}

/// Run `operation`, retrying transient failures up to `config.max_retries` times.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut delay = config.initial_delay;
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if retries > 0 {
                    info!(operation = operation_name, retries, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) if err.is_transient() && retries < config.max_retries => {
                retries += 1;
                warn!(
                    operation = operation_name,
                    attempt = retries,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                sleep(delay).await;
                delay = delay.mul_f64(config.factor).min(config.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}
