use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::env::AppConfig;
use crate::error::AppError;

/// Exponential backoff for transient model failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retries: config.ai_retry_attempts,
            initial_delay: config.ai_retry_delay,
        }
    }

    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Runs `operation`, retrying only errors that look like provider-side
/// internal faults. The delay doubles after every retry.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut retries_left = policy.retries;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retries_left > 0 && err.is_internal_service_error() => {
                warn!(
                    call = label,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    retries_left,
                    "AI internal error, retrying"
                );
                tokio::time::sleep(delay).await;
                retries_left -= 1;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}
