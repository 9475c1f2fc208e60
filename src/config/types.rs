use crate::ErrorKind;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Polite-Fetch
///
/// Every section has defaults, so an empty TOML document is a valid
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub robots: RobotsConfig,
}

/// Fetch strategy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Wall-clock timeout for the simple HTTP strategy (seconds)
    #[serde(rename = "timeout-seconds")]
    pub timeout_seconds: f64,

    /// Wall-clock timeout for the scripted browser strategy (seconds)
    #[serde(rename = "browser-timeout-seconds")]
    pub browser_timeout_seconds: f64,

    /// Strategy used when a request does not ask for one
    #[serde(rename = "use-browser-by-default")]
    pub use_browser_by_default: bool,

    /// Run the shared browser without a window
    #[serde(rename = "browser-headless")]
    pub browser_headless: bool,

    /// Pool of User-Agent strings rotated across requests
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Optional upstream proxy for both strategies
    #[serde(rename = "proxy-url")]
    pub proxy_url: Option<String>,
}

/// Per-domain politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum number of in-flight fetches per domain
    #[serde(rename = "max-concurrent-requests-per-domain")]
    pub max_concurrent_requests_per_domain: u32,

    /// Lower bound of the randomized gap between fetch starts (seconds)
    #[serde(rename = "min-delay-seconds")]
    pub min_delay_seconds: f64,

    /// Upper bound of the randomized gap between fetch starts (seconds)
    #[serde(rename = "max-delay-seconds")]
    pub max_delay_seconds: f64,
}

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Sleep before the first retry (seconds)
    #[serde(rename = "base-delay-seconds")]
    pub base_delay_seconds: f64,

    /// Factor applied to the delay after every retry
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Fraction of the delay used as +/- jitter
    #[serde(rename = "jitter-fraction")]
    pub jitter_fraction: f64,

    /// Error kinds that trigger another attempt
    #[serde(rename = "retry-on")]
    pub retry_on: Vec<ErrorKind>,
}

/// Robots.txt compliance configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// Whether robots.txt is fetched and enforced at all
    pub respect: bool,

    /// User agent matched against robots.txt groups
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Maximum number of domains kept in the robots.txt cache
    #[serde(rename = "cache-size")]
    pub cache_size: usize,

    /// Timeout for a single robots.txt request (seconds)
    #[serde(rename = "fetch-timeout-seconds")]
    pub fetch_timeout_seconds: f64,
}

/// User agents rotated when the configuration does not name any
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
];

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30.0,
            browser_timeout_seconds: 60.0,
            use_browser_by_default: false,
            browser_headless: true,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            proxy_url: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests_per_domain: 1,
            min_delay_seconds: 3.0,
            max_delay_seconds: 10.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_seconds: 1.0,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.5,
            retry_on: vec![
                ErrorKind::Timeout,
                ErrorKind::Transport,
                ErrorKind::Browser,
                ErrorKind::HttpStatus,
            ],
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect: true,
            user_agent: "*".to_string(),
            cache_size: 100,
            fetch_timeout_seconds: 10.0,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.browser_timeout_seconds)
    }

    /// User agents to rotate, falling back to the built-in pool when none are configured
    pub fn user_agent_pool(&self) -> Vec<String> {
        if self.user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.user_agents.clone()
        }
    }
}

impl RobotsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fetch_timeout_seconds)
    }
}
