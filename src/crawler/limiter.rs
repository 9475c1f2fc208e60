//! Per-domain rate limiter
//!
//! Every domain gets a lazily-created [`DomainState`] holding a concurrency
//! semaphore and the start time of its last fetch. Acquiring a permit first
//! waits for a free slot, then waits out the randomized politeness gap.

use crate::config::RateLimitConfig;
use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, RwLock};

/// Scoped permit to fetch from a domain
///
/// The concurrency slot is returned to the domain's semaphore when the
/// permit is dropped, including when the owning future is cancelled.
#[derive(Debug)]
pub struct DomainPermit {
    domain: String,
    _permit: OwnedSemaphorePermit,
}

impl DomainPermit {
    /// Returns the domain this permit was issued for
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Gives the slot back explicitly
    pub fn release(self) {}
}

impl Drop for DomainPermit {
    fn drop(&mut self) {
        tracing::trace!("Released rate-limit slot for domain '{}'", self.domain);
    }
}

/// Rate limiter keyed by domain
pub struct DomainRateLimiter {
    domains: RwLock<HashMap<String, Arc<DomainState>>>,
    max_concurrent: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl DomainRateLimiter {
    /// Creates a limiter from the `[rate-limit]` configuration section
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(
            config.max_concurrent_requests_per_domain as usize,
            Duration::from_secs_f64(config.min_delay_seconds.max(0.0)),
            Duration::from_secs_f64(config.max_delay_seconds.max(0.0)),
        )
    }

    /// Creates a limiter with explicit limits
    pub fn with_limits(max_concurrent: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            max_concurrent: max_concurrent.max(1),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Waits for permission to start a fetch against `domain`
    ///
    /// Blocks until a concurrency slot is free, then until the politeness gap
    /// since the domain's previous fetch start has elapsed. The returned
    /// permit holds the slot until it is dropped.
    pub async fn acquire(&self, domain: &str) -> Result<DomainPermit, AcquireError> {
        let state = self.domain_state(domain).await;

        tracing::trace!(
            "Waiting for rate-limit slot on '{}' ({} free)",
            domain,
            state.available_permits()
        );
        let permit = state.acquire_slot().await?;

        let slept = state.wait_turn(self.min_delay, self.max_delay).await;
        tracing::debug!(
            "Acquired rate-limit slot for '{}' after {:.2}s politeness wait",
            domain,
            slept.as_secs_f64()
        );

        Ok(DomainPermit {
            domain: domain.to_string(),
            _permit: permit,
        })
    }

    /// Returns the number of domains seen so far
    pub async fn tracked_domains(&self) -> usize {
        self.domains.read().await.len()
    }

    /// Forgets all per-domain state
    pub async fn clear(&self) {
        let mut domains = self.domains.write().await;
        let count = domains.len();
        domains.clear();
        tracing::info!("Cleared rate-limit state for {} domains", count);
    }

    async fn domain_state(&self, domain: &str) -> Arc<DomainState> {
        if let Some(state) = self.domains.read().await.get(domain) {
            return Arc::clone(state);
        }

        let mut domains = self.domains.write().await;
        Arc::clone(domains.entry(domain.to_string()).or_insert_with(|| {
            tracing::debug!("Tracking new domain '{}' for rate limiting", domain);
            Arc::new(DomainState::new(domain, self.max_concurrent))
        }))
    }
}
