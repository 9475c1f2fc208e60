//! Polite-Fetch: a polite, concurrent web-fetching engine
//!
//! This crate fetches pages while respecting per-site crawl etiquette
//! (robots.txt, per-domain concurrency and request spacing) and recovering
//! from transient network failures with exponential backoff.

pub mod config;
pub mod crawler;
pub mod retry;
pub mod robots;
pub mod state;
pub mod url;

use serde::Deserialize;
use thiserror::Error;

/// Sentinel status for a URL disallowed by robots.txt
pub const STATUS_ROBOTS_DISALLOWED: u16 = 403;
/// Sentinel status for a fetch that hit its wall-clock timeout
pub const STATUS_TIMEOUT: u16 = 408;
/// Sentinel status for an unexpected orchestrator failure
pub const STATUS_UNEXPECTED: u16 = 500;
/// Sentinel status for a scripted-browser internal failure
pub const STATUS_BROWSER_INTERNAL: u16 = 597;
/// Sentinel status for a scripted-browser navigation failure
pub const STATUS_BROWSER_NAVIGATION: u16 = 598;
/// Sentinel status for DNS, connection and other transport failures
pub const STATUS_TRANSPORT: u16 = 599;
/// Sentinel status for input with no derivable domain
pub const STATUS_INVALID_URL: u16 = 0;

/// Coarse classification of fetch failures
///
/// Used by the retry configuration (`retry-on`) to decide which failures
/// are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    RobotsDisallowed,
    Timeout,
    Transport,
    Browser,
    HttpStatus,
    InvalidUrl,
    Unexpected,
}

/// Failure of a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL '{url}' is disallowed for user-agent '{user_agent}' by robots.txt")]
    RobotsDisallowed { url: String, user_agent: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Browser navigation error for {url}: {message}")]
    BrowserNavigation { url: String, message: String },

    #[error("Browser internal error for {url}: {message}")]
    BrowserInternal { url: String, message: String },

    #[error("Invalid URL or no derivable domain: {url}")]
    InvalidUrl { url: String },

    #[error("Unexpected error for {url}: {message}")]
    Unexpected { url: String, message: String },
}

impl FetchError {
    /// Returns the coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RobotsDisallowed { .. } => ErrorKind::RobotsDisallowed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::BrowserNavigation { .. } | Self::BrowserInternal { .. } => ErrorKind::Browser,
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Returns the status code reported to callers for this failure
    ///
    /// HTTP status errors carry the literal upstream status; every other
    /// variant maps to a sentinel.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RobotsDisallowed { .. } => STATUS_ROBOTS_DISALLOWED,
            Self::Timeout { .. } => STATUS_TIMEOUT,
            Self::Transport { .. } => STATUS_TRANSPORT,
            Self::HttpStatus { status, .. } => *status,
            Self::BrowserNavigation { .. } => STATUS_BROWSER_NAVIGATION,
            Self::BrowserInternal { .. } => STATUS_BROWSER_INTERNAL,
            Self::InvalidUrl { .. } => STATUS_INVALID_URL,
            Self::Unexpected { .. } => STATUS_UNEXPECTED,
        }
    }

    /// Returns the URL this error refers to
    ///
    /// For HTTP status errors this is the URL after redirects.
    pub fn url(&self) -> &str {
        match self {
            Self::RobotsDisallowed { url, .. }
            | Self::Timeout { url }
            | Self::Transport { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::BrowserNavigation { url, .. }
            | Self::BrowserInternal { url, .. }
            | Self::InvalidUrl { url }
            | Self::Unexpected { url, .. } => url,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchRequest, FetchResult, FetchStrategy, Orchestrator};
pub use retry::RetryPolicy;
pub use state::DomainState;
pub use url::{extract_domain, parse_fetch_url, robots_authority};
