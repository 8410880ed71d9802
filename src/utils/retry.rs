use std::future::Future;
use std::time::Duration;

use log::{error, warn};
use rand::Rng;
use serde::Deserialize;

/// Retry policy for calls against the control plane.
///
/// `max_attempts` counts the first attempt, so the default of 1 disables retries.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,

    /// Delay, in milliseconds, before the first retry.
    pub initial_delay_ms: u64,

    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    #[cfg(test)]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }
}

/// Runs `operation` until it succeeds, `should_retry` rejects the error, or the
/// attempt budget is spent. Delays grow exponentially with 0.5x-1.5x jitter.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let mut delay = Duration::from_millis(config.initial_delay_ms).min(max_delay);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if !should_retry(&err) => return Err(err),
            Err(err) if attempt >= max_attempts => {
                if max_attempts > 1 {
                    error!(
                        "{} failed after {} attempts: {}",
                        operation_name, attempt, err
                    );
                }
                return Err(err);
            }
            Err(err) => {
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    "{} attempt {} failed: {}; retrying in {}ms",
                    operation_name,
                    attempt,
                    err,
                    jittered_delay.as_millis()
                );

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor).min(max_delay.as_secs_f64()),
                );
            }
        }
    }
}
