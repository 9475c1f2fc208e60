//! Bounded robots.txt storage
//!
//! Parsed robots.txt entries are kept in an LRU keyed by domain authority.
//! Inserting past capacity evicts the least-recently-used domain, which is
//! re-fetched if it is requested again.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cached robots.txt data for a domain
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content, or the permissive sentinel
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance stamped with the current time
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }
}

/// LRU-bounded map from domain authority to cached robots.txt
#[derive(Debug)]
pub struct RobotsStore {
    entries: LruCache<String, CachedRobots>,
}

impl RobotsStore {
    /// Creates a store holding at most `capacity` domains (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Looks up a domain, marking it most recently used on a hit
    pub fn get(&mut self, domain: &str) -> Option<CachedRobots> {
        self.entries.get(domain).cloned()
    }

    /// Inserts a domain's robots.txt, evicting the least-recently-used
    /// entry if the store is full
    ///
    /// # Returns
    ///
    /// The evicted domain, if any
    pub fn insert(&mut self, domain: String, robots: CachedRobots) -> Option<String> {
        match self.entries.push(domain.clone(), robots) {
            Some((evicted, _)) if evicted != domain => Some(evicted),
            _ => None,
        }
    }

    /// Returns true if the domain is cached, without touching LRU order
    pub fn contains(&self, domain: &str) -> bool {
        self.entries.contains(domain)
    }

    /// Returns the number of cached domains
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of cached domains
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Removes every cached entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
