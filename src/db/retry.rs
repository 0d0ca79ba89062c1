use crate::errors::ServiceError;
use metrics::counter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behaviour for a unit of work that may lose a storage conflict.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(250),
            backoff_factor: 2.0,
        }
    }
}

/// Re-runs `operation` while it fails with a retryable `ServiceError`.
///
/// Each attempt must open its own transaction so a retry re-reads committed
/// state. Business errors are returned on the first occurrence. Callers bound
/// the total time by wrapping the call in [`super::with_timeout`].
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &'static str,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation = operation_name, attempts, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempts < config.max_attempts => {
                counter!("storefront_db.transaction_retries", 1, "operation" => operation_name);
                // Jitter keeps racing writers from colliding again in lockstep.
                let pause = delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5));
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    error = %err,
                    "retrying after storage conflict in {:?}",
                    pause
                );
                sleep(pause).await;
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
                );
            }
            Err(err) => return Err(err),
        }
    }
}
