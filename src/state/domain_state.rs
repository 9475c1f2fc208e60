use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Tracks the politeness state of a single domain
///
/// One instance exists per distinct domain seen by the rate limiter. It is
/// created lazily on first use and lives until the limiter is cleared.
#[derive(Debug)]
pub struct DomainState {
    /// The domain this state belongs to
    domain: String,

    /// Bounds the number of in-flight fetches for this domain
    semaphore: Arc<Semaphore>,

    /// Start time of the most recent fetch, guarded so the
    /// check-sleep-record sequence runs for one caller at a time
    last_request: Mutex<Option<Instant>>,
}

impl DomainState {
    /// Creates a new DomainState allowing `max_concurrent` in-flight fetches
    pub fn new(domain: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            domain: domain.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            last_request: Mutex::new(None),
        }
    }

    /// Returns the domain this state belongs to
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the number of fetch slots currently free
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a concurrency slot on this domain
    ///
    /// There is no timeout: callers queue until a slot frees up.
    pub async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Waits until at least a randomized delay in `[min_delay, max_delay]`
    /// has passed since the last recorded fetch start, then records now
    ///
    /// The whole sequence holds this domain's lock, so two waiters can never
    /// both observe the same stale timestamp and start together.
    ///
    /// # Returns
    ///
    /// The time actually slept
    pub async fn wait_turn(&self, min_delay: Duration, max_delay: Duration) -> Duration {
        let mut last_request = self.last_request.lock().await;

        let required = required_delay(min_delay, max_delay);
        let mut slept = Duration::ZERO;

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < required {
                slept = required - elapsed;
                tracing::debug!(
                    "Rate limiting domain '{}': sleeping for {:.2}s (required {:.2}s, since last {:.2}s)",
                    self.domain,
                    slept.as_secs_f64(),
                    required.as_secs_f64(),
                    elapsed.as_secs_f64()
                );
                tokio::time::sleep(slept).await;
            }
        }

        *last_request = Some(Instant::now());
        slept
    }

    /// Returns the start time of the most recent fetch, if any
    pub async fn last_request_time(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

/// Draws the gap required before the next fetch start
fn required_delay(min_delay: Duration, max_delay: Duration) -> Duration {
    if max_delay <= min_delay {
        return min_delay;
    }
    let secs = rand::thread_rng().gen_range(min_delay.as_secs_f64()..=max_delay.as_secs_f64());
    Duration::from_secs_f64(secs)
}
