//! Configuration module for Polite-Fetch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The configuration is loaded once at startup and treated as read-only.
//!
//! # Example
//!
//! ```no_run
//! use polite_fetch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("polite-fetch.toml")).unwrap();
//! println!("Per-domain concurrency: {}", config.rate_limit.max_concurrent_requests_per_domain);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetcherConfig, RateLimitConfig, RetryConfig, RobotsConfig, DEFAULT_USER_AGENTS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
