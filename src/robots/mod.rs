//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Lookups for an uncached domain are single-flighted: concurrent callers wait on a
//! per-domain lock instead of issuing duplicate requests. Any failure to obtain a
//! robots.txt degrades to "allow everything" and is never surfaced to callers.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsStore};
pub use parser::ParsedRobots;

use crate::config::RobotsConfig;
use crate::url::robots_authority;
use rand::seq::SliceRandom;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Result of a single robots.txt request
enum RobotsResponse {
    /// 200 with a body
    Found(String),
    /// Any other status
    Status(StatusCode),
    /// Transport failure
    Failed(reqwest::Error),
}

/// Shared robots.txt cache with per-domain single-flight fetching
pub struct RobotsCache {
    /// Bounded LRU of parsed robots.txt by domain authority
    store: Mutex<RobotsStore>,

    /// Per-domain locks serializing the fetch for an uncached domain
    fetch_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,

    /// Client used for robots.txt requests only
    client: Client,

    /// User agents rotated across robots.txt requests
    user_agents: Vec<String>,
}

impl RobotsCache {
    /// Creates a new cache from the `[robots]` configuration section
    ///
    /// # Arguments
    ///
    /// * `config` - Robots.txt configuration (cache size, fetch timeout)
    /// * `user_agents` - User-Agent header values rotated across requests
    pub fn new(config: &RobotsConfig, user_agents: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .redirect(Policy::limited(5))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self::with_client(config.cache_size, client, user_agents))
    }

    /// Creates a new cache around an existing HTTP client
    pub fn with_client(capacity: usize, client: Client, user_agents: Vec<String>) -> Self {
        Self {
            store: Mutex::new(RobotsStore::new(capacity)),
            fetch_locks: Mutex::new(HashMap::new()),
            client,
            user_agents,
        }
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// On a cache hit this only touches LRU order. On a miss it fetches and
    /// parses the domain's robots.txt, at most once concurrently per domain.
    /// URLs without a host are allowed; callers reject them earlier.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let domain = match robots_authority(url) {
            Some(domain) => domain,
            None => {
                tracing::warn!("Could not extract domain from '{}' for robots.txt check", url);
                return true;
            }
        };

        let robots = self.get_robots(&domain).await;
        let allowed = robots.is_allowed(url.as_str(), user_agent);

        if allowed {
            tracing::trace!("URL '{}' is allowed by robots.txt for '{}'", url, user_agent);
        } else {
            tracing::debug!("URL '{}' is disallowed by robots.txt for '{}'", url, user_agent);
        }

        allowed
    }

    /// Returns the cached robots.txt for a domain, fetching it on a miss
    pub async fn get_robots(&self, domain: &str) -> CachedRobots {
        if let Some(cached) = self.lookup(domain) {
            tracing::trace!(
                "Using cached robots.txt for domain: {} (age {}s)",
                domain,
                cached.age().num_seconds()
            );
            return cached;
        }

        let fetch_lock = self.fetch_lock(domain);
        let _guard = fetch_lock.lock().await;

        // Another waiter may have filled the cache while we queued
        if let Some(cached) = self.lookup(domain) {
            return cached;
        }

        let cached = CachedRobots::new(self.fetch_robots(domain).await);

        let (evicted, size) = {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = store.insert(domain.to_string(), cached.clone());
            (evicted, store.len())
        };
        // Queued waiters hold their own handle and will hit the cache
        self.release_fetch_lock(domain, &fetch_lock);

        if let Some(evicted) = evicted {
            tracing::debug!("Robots.txt cache full, evicted domain: {}", evicted);
        }
        tracing::debug!(
            "Cached robots.txt for domain: {} (permissive: {}, cache size: {})",
            domain,
            cached.content.is_permissive(),
            size
        );

        cached
    }

    /// Fetches and parses robots.txt for a domain
    ///
    /// Tries HTTPS first and falls back to HTTP on a transport failure or any
    /// non-200 response. Never fails: anything other than a 200 body yields
    /// the permissive sentinel.
    pub async fn fetch_robots(&self, domain: &str) -> ParsedRobots {
        let https_url = format!("https://{}/robots.txt", domain);
        let http_url = format!("http://{}/robots.txt", domain);

        match self.request(&https_url).await {
            RobotsResponse::Found(body) => {
                tracing::info!("Fetched robots.txt for domain: {} from {}", domain, https_url);
                return ParsedRobots::from_content(&body);
            }
            RobotsResponse::Status(status) => {
                tracing::debug!("robots.txt at {} returned {}, trying HTTP", https_url, status);
            }
            RobotsResponse::Failed(e) => {
                tracing::debug!("Error fetching robots.txt from {}: {}, trying HTTP", https_url, e);
            }
        }

        match self.request(&http_url).await {
            RobotsResponse::Found(body) => {
                tracing::info!("Fetched robots.txt for domain: {} from {}", domain, http_url);
                ParsedRobots::from_content(&body)
            }
            RobotsResponse::Status(status) => {
                tracing::debug!(
                    "robots.txt at {} returned {}, assuming permissive",
                    http_url,
                    status
                );
                ParsedRobots::allow_all()
            }
            RobotsResponse::Failed(e) => {
                tracing::warn!(
                    "Error fetching robots.txt from {}: {}. Assuming permissive",
                    http_url,
                    e
                );
                ParsedRobots::allow_all()
            }
        }
    }

    /// Returns true if the domain is currently cached
    pub fn contains(&self, domain: &str) -> bool {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(domain)
    }

    /// Returns the number of cached domains
    pub fn len(&self) -> usize {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached entry and fetch lock
    pub fn clear(&self) {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("Robots.txt cache and fetch locks cleared");
    }

    fn lookup(&self, domain: &str) -> Option<CachedRobots> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
    }

    fn fetch_lock(&self, domain: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_fetch_lock(&self, domain: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(domain)
            .is_some_and(|current| Arc::ptr_eq(current, lock))
        {
            locks.remove(domain);
        }
    }

    async fn request(&self, url: &str) -> RobotsResponse {
        let mut request = self.client.get(url);
        if let Some(user_agent) = self.user_agents.choose(&mut rand::thread_rng()) {
            request = request.header(reqwest::header::USER_AGENT, user_agent.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return RobotsResponse::Failed(e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return RobotsResponse::Status(status);
        }

        match response.text().await {
            Ok(body) => RobotsResponse::Found(body),
            Err(e) => RobotsResponse::Failed(e),
        }
    }
}
