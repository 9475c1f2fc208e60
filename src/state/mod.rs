//! Per-domain politeness state
//!
//! This module holds the state the rate limiter keeps for every domain:
//! a concurrency semaphore and the start time of the most recent fetch.

mod domain_state;

pub use domain_state::DomainState;
