//! Integration tests for the fetch pipeline
//!
//! These tests use wiremock to create mock HTTP servers and exercise
//! robots.txt handling, rate limiting, retries and error mapping end-to-end.

mod fetch_tests;
mod limiter_tests;
mod robots_tests;

use polite_fetch::config::Config;
use polite_fetch::ErrorKind;

/// Creates a test configuration with no politeness delay and fast retries
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.fetcher.timeout_seconds = 5.0;
    config.rate_limit.min_delay_seconds = 0.0;
    config.rate_limit.max_delay_seconds = 0.0;
    config.retry.max_retries = 0;
    config.retry.base_delay_seconds = 0.001;
    config.retry.retry_on = vec![
        ErrorKind::Timeout,
        ErrorKind::Transport,
        ErrorKind::Browser,
        ErrorKind::HttpStatus,
    ];
    config.robots.fetch_timeout_seconds = 2.0;
    config
}
