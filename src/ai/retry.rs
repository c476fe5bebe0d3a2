//! Bounded Retry with Exponential Backoff
//!
//! Retry discipline for backend calls: a fixed maximum attempt count,
//! exponential backoff with random jitter, and category-aware fail-fast for
//! errors that will not improve on retry (auth, bad request).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::SynthesisConfig;
use crate::types::{ErrorCategory, FlowError};

/// All attempts failed; carries the count and the last underlying error
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: FlowError,
}

/// Retry policy shared by the synthesizer and the content generator
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::retry::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(crate::constants::retry::BASE_DELAY_MS),
            max_delay: Duration::from_secs(crate::constants::retry::MAX_DELAY_SECS),
            backoff_factor: crate::constants::retry::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn from_synthesis_config(config: &SynthesisConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_secs(config.max_delay_secs),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    ///
    /// Non-retryable errors (auth, bad request) abort immediately but still
    /// report the attempt count consumed so far. Rate-limit errors wait the
    /// category's recommended delay instead of the backoff curve.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> std::result::Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::types::Result<T>>,
    {
        let mut current_delay = self.base_delay;
        let mut last_error: Option<FlowError> = None;

        for attempt in 1..=self.max_attempts {
            match call(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let category = err.category();
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        category = %category,
                        error = %err,
                        "Attempt failed"
                    );

                    if !category.is_retryable() {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }

                    last_error = Some(err);

                    if attempt < self.max_attempts {
                        let wait = match category {
                            ErrorCategory::RateLimit => category.recommended_delay(),
                            _ => current_delay + random_jitter(current_delay),
                        };
                        debug!(operation, wait_ms = wait.as_millis(), "Backing off");
                        sleep(wait).await;
                        current_delay =
                            calculate_backoff(current_delay, self.backoff_factor, self.max_delay);
                    }
                }
            }
        }

        Err(RetryExhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .unwrap_or_else(|| FlowError::Backend("retry exhausted".to_string())),
        })
    }
}

/// Random jitter up to a quarter of the base delay
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

/// Exponential backoff with cap
fn calculate_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    let next = Duration::from_secs_f32(current.as_secs_f32() * factor);
    std::cmp::min(next, max)
}
