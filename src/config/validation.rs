use crate::config::types::{Config, FetcherConfig, RateLimitConfig, RetryConfig, RobotsConfig};
use crate::{ConfigError, ErrorKind};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_robots_config(&config.robots)?;
    Ok(())
}

/// Validates fetch strategy configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    validate_positive("timeout-seconds", config.timeout_seconds)?;
    validate_positive("browser-timeout-seconds", config.browser_timeout_seconds)?;

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty entries".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy_url {
        let url = Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy-url: {}", e)))?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "proxy-url '{}' has no host",
                proxy
            )));
        }
    }

    Ok(())
}

/// Validates per-domain politeness configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests_per_domain < 1
        || config.max_concurrent_requests_per_domain > 100
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests-per-domain must be between 1 and 100, got {}",
            config.max_concurrent_requests_per_domain
        )));
    }

    if !config.min_delay_seconds.is_finite() || config.min_delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min-delay-seconds must be >= 0, got {}",
            config.min_delay_seconds
        )));
    }

    if !config.max_delay_seconds.is_finite()
        || config.max_delay_seconds < config.min_delay_seconds
    {
        return Err(ConfigError::Validation(format!(
            "max-delay-seconds ({}) must be >= min-delay-seconds ({})",
            config.max_delay_seconds, config.min_delay_seconds
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if !config.base_delay_seconds.is_finite() || config.base_delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "base-delay-seconds must be >= 0, got {}",
            config.base_delay_seconds
        )));
    }

    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-multiplier must be >= 1.0, got {}",
            config.backoff_multiplier
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter_fraction) {
        return Err(ConfigError::Validation(format!(
            "jitter-fraction must be between 0 and 1, got {}",
            config.jitter_fraction
        )));
    }

    // A robots verdict or a malformed URL cannot change on a second attempt
    for kind in &config.retry_on {
        if matches!(kind, ErrorKind::RobotsDisallowed | ErrorKind::InvalidUrl) {
            return Err(ConfigError::Validation(format!(
                "retry-on cannot contain {:?}",
                kind
            )));
        }
    }

    Ok(())
}

/// Validates robots.txt configuration
fn validate_robots_config(config: &RobotsConfig) -> Result<(), ConfigError> {
    if config.cache_size < 1 {
        return Err(ConfigError::Validation(
            "robots cache-size must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots user-agent cannot be empty".to_string(),
        ));
    }

    validate_positive("fetch-timeout-seconds", config.fetch_timeout_seconds)
}

fn validate_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be > 0, got {}",
            name, value
        )));
    }
    Ok(())
}
