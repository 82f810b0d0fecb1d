//! Retry policy applied by the fetch pipeline to source-level reads.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppError;

/// Backoff strategy between attempts
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Fixed delay between retries
    Fixed { delay: Duration },
    /// Exponential backoff, capped
    Exponential {
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub strategy: RetryStrategy,
    /// ± fraction of randomness applied to each delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::Exponential {
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
            },
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::Fixed { delay: Duration::ZERO },
            jitter: 0.0,
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            strategy: RetryStrategy::Exponential {
                initial_delay,
                max_delay: initial_delay.saturating_mul(16),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match &self.strategy {
            RetryStrategy::Fixed { delay } => *delay,
            RetryStrategy::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                initial_delay.mul_f64(factor).min(*max_delay)
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = rand::rng().random_range(-self.jitter..=self.jitter);
        delay.mul_f64((1.0 + spread).max(0.0))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    let delay = self.jittered(self.delay_for_attempt(attempt));
                    debug!(attempt, backoff_ms = delay.as_millis() as u64, "retrying {}", label);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        warn!("{} failed after {} attempts", label, attempt);
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Errors that know whether a retry could help
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for AppError {
    fn is_retryable(&self) -> bool {
        AppError::is_retryable(self)
    }
}

impl RetryableError for crate::error::LedgerError {
    fn is_retryable(&self) -> bool {
        crate::error::LedgerError::is_retryable(self)
    }
}

impl RetryableError for crate::error::MetadataError {
    fn is_retryable(&self) -> bool {
        crate::error::MetadataError::is_retryable(self)
    }
}
