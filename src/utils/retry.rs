//! Retry utilities with exponential backoff for upstream API calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on the operation (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(15),
        }
    }
}

/// Retry configuration for source adapters.
///
/// Fan-out retrieval waits for every source before ranking, so a slow
/// retry loop in one adapter delays the whole response. Budgets here are
/// deliberately tight; a source that cannot answer in time is dropped
/// and the engine degrades to the remaining sources.
pub fn source_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(300),
        max_delay: Duration::from_secs(3),
        backoff_multiplier: 2.0,
        max_total_time: Duration::from_secs(10),
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded
    RateLimit,
    /// Upstream temporarily unavailable (5xx)
    Unavailable,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a SourceError represents a transient error
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::RateLimit => Some(TransientError::RateLimit),
            SourceError::Network(msg) => {
                if msg.to_lowercase().contains("timed out") {
                    Some(TransientError::Timeout)
                } else {
                    Some(TransientError::Network)
                }
            }
            SourceError::Api(msg) => {
                let msg_lower = msg.to_lowercase();
                if msg_lower.contains("timeout") {
                    Some(TransientError::Timeout)
                } else if msg_lower.contains("unavailable") || msg_lower.contains("overloaded") {
                    Some(TransientError::Unavailable)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Get the recommended delay for this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::RateLimit => Duration::from_secs(2),
            TransientError::Unavailable => Duration::from_secs(1),
            TransientError::Timeout => Duration::from_millis(500),
            TransientError::Network => Duration::from_millis(500),
        }
    }
}

/// Execute an async operation, retrying transient failures with
/// exponential backoff.
///
/// Permanent errors (parse failures, bad requests, not-found) are
/// returned immediately. Each attempt is bounded by the total time
/// budget, so a hung connection cannot stall the caller past it.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut operation = operation;

    loop {
        attempts += 1;

        match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::debug!(
                        "operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => {
                let Some(transient) = TransientError::from_source_error(&error) else {
                    // Permanent error, do not retry
                    return Err(error);
                };

                let delay = if attempts == 1 {
                    config.initial_delay
                } else {
                    let exp_delay = config.initial_delay.as_secs_f64()
                        * config.backoff_multiplier.powf(attempts as f64 - 1.0);
                    Duration::from_secs_f64(exp_delay.min(config.max_delay.as_secs_f64()))
                };
                let delay = std::cmp::max(delay, transient.recommended_delay());

                total_elapsed += delay;

                if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
                    tracing::warn!(
                        "operation failed after {} attempts (elapsed {:?}): {}",
                        attempts,
                        total_elapsed,
                        error
                    );
                    return Err(error);
                }

                tracing::debug!(
                    "transient error on attempt {}: {:?}, retrying in {:?}",
                    attempts,
                    transient,
                    delay
                );

                sleep(delay).await;
            }
            Err(_) => {
                // The attempt itself exceeded the total budget
                let error = SourceError::Network("operation timed out".to_string());
                if attempts >= config.max_attempts {
                    return Err(error);
                }

                let delay = config.initial_delay;
                total_elapsed += delay;

                tracing::debug!("attempt {}/{} timed out", attempts, config.max_attempts);
                sleep(delay).await;
            }
        }
    }
}
