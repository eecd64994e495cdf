//! Retry logic with exponential backoff for completion calls.
//!
//! Every attempt runs under its own timeout. Transient failures (timeouts,
//! network errors, 429 and 5xx responses) are retried; a [`PermanentError`]
//! fails immediately.

use anyhow::Result;
use entelgia_core::LlmConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Marks an error that retrying cannot fix (bad request, auth, unknown model).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PermanentError(pub String);

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for each subsequent delay.
    pub backoff_factor: f64,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_llm_config(&LlmConfig::default())
    }
}

impl RetryConfig {
    /// `max_retries` counts retries, so the first call comes on top.
    pub fn from_llm_config(cfg: &LlmConfig) -> Self {
        Self {
            max_attempts: cfg.max_retries + 1,
            initial_delay: Duration::from_millis(cfg.initial_backoff_ms),
            max_delay: Duration::from_millis(cfg.max_backoff_ms),
            backoff_factor: 2.0,
            attempt_timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

/// Execute an async operation with timeout and retry.
///
/// The `operation` closure is called repeatedly until it succeeds, returns a
/// [`PermanentError`], or `max_attempts` is exhausted.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, label: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 1..=attempts {
        match tokio::time::timeout(config.attempt_timeout, operation()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Ok(Err(e)) => {
                if e.downcast_ref::<PermanentError>().is_some() {
                    return Err(e.context(format!("{} failed permanently", label)));
                }
                tracing::warn!("{} error on attempt {}/{}: {:#}", label, attempt, attempts, e);
                last_error = Some(format!("{:#}", e));
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {:.1}s on attempt {}/{}",
                    label,
                    config.attempt_timeout.as_secs_f64(),
                    attempt,
                    attempts
                );
                last_error = Some(format!(
                    "timed out after {:.1}s",
                    config.attempt_timeout.as_secs_f64()
                ));
            }
        }

        if attempt < attempts {
            let sleep_time = delay + jitter(delay);
            tracing::info!(
                "{} retrying in {:.2}s (attempt {}/{})",
                label,
                sleep_time.as_secs_f64(),
                attempt + 1,
                attempts
            );
            tokio::time::sleep(sleep_time).await;

            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    anyhow::bail!(
        "All {} attempts exhausted. Last error: {}",
        attempts,
        last_error.unwrap_or_else(|| "unknown".to_string())
    )
}

/// Up to a quarter of the current delay, never more than 500ms.
fn jitter(delay: Duration) -> Duration {
    let cap = (delay.as_millis() as u64 / 4).min(500);
    if cap == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}
