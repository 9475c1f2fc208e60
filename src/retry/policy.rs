use crate::config::RetryConfig;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Retry budget used when a policy does not set one
static DEFAULT_MAX_RETRIES: AtomicU32 = AtomicU32::new(3);

/// Returns the process-wide default retry budget
pub fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES.load(Ordering::Relaxed)
}

/// Sets the process-wide default retry budget
///
/// Intended to be called once at startup from the loaded configuration.
pub fn set_default_max_retries(max_retries: u32) {
    DEFAULT_MAX_RETRIES.store(max_retries, Ordering::Relaxed);
}

/// Backoff parameters for [`retry`](super::retry)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `None` defers to [`default_max_retries`]
    pub max_retries: Option<u32>,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Factor applied to the delay after every retry
    pub backoff_multiplier: f64,

    /// Fraction of the delay used as symmetric random jitter
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn new(
        max_retries: Option<u32>,
        base_delay: Duration,
        backoff_multiplier: f64,
        jitter_fraction: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_multiplier,
            jitter_fraction,
        }
    }

    /// Builds a policy from the `[retry]` configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Some(config.max_retries),
            Duration::from_secs_f64(config.base_delay_seconds),
            config.backoff_multiplier,
            config.jitter_fraction,
        )
    }

    /// Returns the retry budget, falling back to the process-wide default
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or_else(default_max_retries)
    }

    /// Applies random jitter of up to `jitter_fraction * delay` in either
    /// direction, never returning a negative duration
    pub fn jittered(&self, delay: Duration) -> Duration {
        let base = delay.as_secs_f64();
        let jitter = if self.jitter_fraction > 0.0 {
            rand::thread_rng().gen_range(-self.jitter_fraction..=self.jitter_fraction) * base
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Returns the delay to use after the next failure
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(1), 2.0, 0.5)
    }
}
