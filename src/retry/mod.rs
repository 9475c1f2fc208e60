//! Generic async retry with exponential backoff and jitter
//!
//! The retry primitive knows nothing about HTTP: callers decide which errors
//! are worth another attempt through a classifier closure.
//!
//! # Example
//!
//! ```no_run
//! use polite_fetch::retry::{retry, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::new(Some(2), Duration::from_millis(100), 2.0, 0.5);
//! let value = retry(&policy, "read", |_e: &std::io::Error| true, || async {
//!     Ok::<_, std::io::Error>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

mod policy;

pub use policy::{default_max_retries, set_default_max_retries, RetryPolicy};

use std::fmt::Display;
use std::future::Future;

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent
///
/// The operation is invoked at most `max_retries + 1` times. Between
/// attempts the task sleeps for the current backoff delay (with jitter),
/// then the delay is multiplied by the policy's backoff factor.
///
/// # Arguments
///
/// * `policy` - Backoff parameters and retry budget
/// * `label` - Name of the operation, used in log messages
/// * `is_retryable` - Decides whether an error warrants another attempt
/// * `op` - Produces a fresh future for every attempt
///
/// # Returns
///
/// The first success, or the last error exactly as `op` returned it
pub async fn retry<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_retries = policy.effective_max_retries();
    let total_attempts = max_retries + 1;
    let mut delay = policy.base_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable(&error) {
            tracing::debug!(
                "'{}' failed with a non-retryable error on attempt {}: {}",
                label,
                attempt,
                error
            );
            return Err(error);
        }

        if attempt >= total_attempts {
            tracing::error!(
                "'{}' failed after {} attempts. Last error: {}",
                label,
                total_attempts,
                error
            );
            return Err(error);
        }

        let sleep_for = policy.jittered(delay);
        tracing::warn!(
            "Attempt {}/{} for '{}' failed: {}. Retrying in {:.2}s",
            attempt,
            total_attempts,
            label,
            error,
            sleep_for.as_secs_f64()
        );

        tokio::time::sleep(sleep_for).await;
        delay = policy.next_delay(delay);
    }
}
