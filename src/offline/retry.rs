//! # Retry Policy and Backoff Strategies
//!
//! Decides when a failed operation is attempted again and when it is given up
//! on.
//!
//! - **Fixed**: the same delay after every failure
//! - **Exponential**: `base * 2^(attempt - 1)` capped at `max`, plus up to
//!   `jitter * delay` of random spread so clients that failed together do not
//!   retry together

use crate::shared::SyncConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed interval between retries
    Fixed {
        /// Interval in seconds
        interval_seconds: u64,
    },
    /// Exponential backoff with jitter
    Exponential {
        /// Base interval in seconds
        base_interval: u64,
        /// Maximum interval in seconds
        max_interval: u64,
        /// Jitter factor (0.0 to 1.0)
        jitter: f64,
    },
}

impl BackoffStrategy {
    /// Delay before the attempt following failure number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed { interval_seconds } => Duration::from_secs(*interval_seconds),
            BackoffStrategy::Exponential {
                base_interval,
                max_interval,
                jitter,
            } => {
                let exponent = attempt.saturating_sub(1).min(32);
                let delay = base_interval
                    .saturating_mul(1u64 << exponent)
                    .min(*max_interval);

                let spread = (delay as f64 * jitter.clamp(0.0, 1.0) * 1000.0) as u64;
                let jitter_ms = if spread == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=spread)
                };
                Duration::from_secs(delay).saturating_add(Duration::from_millis(jitter_ms))
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base_interval: 1,
            max_interval: 300,
            jitter: 0.1,
        }
    }
}

/// Backoff plus the attempt budget
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub backoff: BackoffStrategy,
    /// Failed attempts after which an operation is dead-lettered
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(backoff: BackoffStrategy, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            BackoffStrategy::Exponential {
                base_interval: config.backoff_base_seconds,
                max_interval: config.backoff_max_seconds,
                jitter: config.backoff_jitter,
            },
            config.max_retry_attempts,
        )
    }

    /// Whether `attempts` failures exhaust the budget
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// When to try again after failure number `attempts`
    pub fn next_attempt_at(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        let delay = self.backoff.delay(attempts);
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
        now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(BackoffStrategy::default(), 5)
    }
}
