//! Retry with capped exponential backoff and jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::ConfigError;

/// Fraction of the current delay added as random jitter (upper bound).
const JITTER_RATIO: f64 = 0.1;

/// Backoff parameters.
///
/// The operation runs at most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay that follows `delay`: `min(delay * multiplier, max_delay)`.
    ///
    /// A product too large for `Duration` saturates at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let secs = (delay.as_secs_f64() * self.backoff_multiplier).max(0.0);
        Duration::try_from_secs_f64(secs)
            .map_or(self.max_delay(), |next| next.min(self.max_delay()))
    }

    /// Rejects multipliers that would shrink or never grow a finite delay.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBackoffMultiplier`] unless the multiplier is
    /// finite and at least `1.0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidBackoffMultiplier(self.backoff_multiplier))
        }
    }

    /// Actual wait before the next attempt: `min(delay + jitter, max_delay)`,
    /// with `jitter` uniform in `[0, 10% of delay]`.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        let jitter = delay.mul_f64(rand::rng().random_range(0.0..=JITTER_RATIO));
        delay.saturating_add(jitter).min(self.max_delay())
    }
}

/// Runs `op` until it succeeds or `config.max_retries` retries are spent.
///
/// A success on any attempt is returned immediately. After the final
/// failure an error event is logged and that last error is returned
/// unchanged.
///
/// # Errors
///
/// Returns the error of the last attempt when every attempt failed.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let total_attempts = config.max_retries.saturating_add(1);
    let mut delay = config.initial_delay().min(config.max_delay());
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < total_attempts => {
                let wait = config.jittered(delay);
                let delay_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    attempt,
                    max_attempts = total_attempts,
                    delay_ms,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = config.next_delay(delay);
                attempt += 1;
            }
            Err(err) => {
                error!(
                    attempts = total_attempts,
                    error = %err,
                    "all retry attempts exhausted"
                );
                return Err(err);
            }
        }
    }
}
