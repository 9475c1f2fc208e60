//! Fetch orchestration
//!
//! The orchestrator ties the politeness machinery together. For every
//! attempt it checks robots.txt, waits for a rate-limit slot, runs the chosen
//! fetch strategy and inspects the body for challenge pages. Attempts are
//! retried on the configured error kinds, and every outcome is reported as a
//! [`FetchResult`]; callers never see an error type.

use crate::config::{validate, Config};
use crate::crawler::browser::{BrowserOptions, SharedBrowser};
use crate::crawler::captcha::detect_captcha;
use crate::crawler::fetcher::{FetchedPage, HttpFetcher};
use crate::crawler::limiter::DomainRateLimiter;
use crate::retry::{retry, RetryPolicy};
use crate::robots::RobotsCache;
use crate::url::parse_fetch_url;
use crate::{ConfigError, ErrorKind, FetchError};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use url::Url;

/// How a page should be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Use the configured default
    #[default]
    Auto,
    /// Plain HTTP client
    SimpleHttp,
    /// Headless browser that executes scripts
    ScriptedBrowser,
}

/// A single fetch to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub preferred_strategy: FetchStrategy,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            preferred_strategy: FetchStrategy::Auto,
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.preferred_strategy = strategy;
        self
    }
}

/// Outcome of a fetch
///
/// `body` is present exactly when `status_code` is in the 2xx range. Failed
/// fetches carry either the upstream status or a sentinel code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    body: Option<String>,
    status_code: u16,
    resolved_url: String,
}

impl FetchResult {
    fn from_page(page: FetchedPage) -> Self {
        Self {
            body: Some(page.body),
            status_code: page.status,
            resolved_url: page.final_url,
        }
    }

    fn from_error(error: &FetchError) -> Self {
        Self {
            body: None,
            status_code: error.status_code(),
            resolved_url: error.url().to_string(),
        }
    }

    /// Page body, present only for 2xx responses
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Consumes the result, returning the body
    pub fn into_body(self) -> Option<String> {
        self.body
    }

    /// Upstream HTTP status or sentinel code
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// URL after redirects, or the requested URL when none was reached
    pub fn resolved_url(&self) -> &str {
        &self.resolved_url
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Http,
    Browser,
}

/// Polite fetch engine shared by all callers
pub struct Orchestrator {
    config: Config,
    robots: RobotsCache,
    limiter: DomainRateLimiter,
    http: HttpFetcher,
    browser: SharedBrowser,
    retry_policy: RetryPolicy,
    retry_on: HashSet<ErrorKind>,
}

impl Orchestrator {
    /// Builds an orchestrator from a configuration
    ///
    /// The browser is not started until the first scripted fetch.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` or `ConfigError::InvalidUrl` if the
    /// configuration is out of range, and `ConfigError::Client` if an HTTP
    /// client cannot be built.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        validate(&config)?;

        let user_agents = config.fetcher.user_agent_pool();

        let http = HttpFetcher::new(&config.fetcher)?;
        let robots = RobotsCache::new(&config.robots, user_agents.clone())?;
        let limiter = DomainRateLimiter::new(&config.rate_limit);
        let browser = SharedBrowser::new(BrowserOptions {
            headless: config.fetcher.browser_headless,
            proxy_url: config.fetcher.proxy_url.clone(),
            timeout: config.fetcher.browser_timeout(),
            user_agents,
        });

        let retry_policy = RetryPolicy::from_config(&config.retry);
        let retry_on = config.retry.retry_on.iter().copied().collect();

        tracing::info!(
            "Orchestrator ready (respect robots: {}, per-domain concurrency: {}, retries: {})",
            config.robots.respect,
            config.rate_limit.max_concurrent_requests_per_domain,
            retry_policy.effective_max_retries()
        );

        Ok(Self {
            config,
            robots,
            limiter,
            http,
            browser,
            retry_policy,
            retry_on,
        })
    }

    /// Returns the configuration this orchestrator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the robots.txt cache
    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    /// Fetches a URL politely
    ///
    /// `strategy` of `None` or `Some(FetchStrategy::Auto)` uses the
    /// configured default strategy.
    pub async fn fetch(&self, url: &str, strategy: Option<FetchStrategy>) -> FetchResult {
        let strategy = self.resolve_strategy(strategy.unwrap_or_default());

        let outcome = AssertUnwindSafe(self.fetch_with_retry(url, strategy))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during fetch".to_string());
                Err(FetchError::Unexpected {
                    url: url.to_string(),
                    message,
                })
            });

        match outcome {
            Ok(page) => FetchResult::from_page(page),
            Err(error) => {
                if let FetchError::Unexpected { message, .. } = &error {
                    tracing::error!("Unexpected failure fetching {}: {}", url, message);
                } else {
                    tracing::warn!(
                        "Fetch of {} failed with status {}: {}",
                        url,
                        error.status_code(),
                        error
                    );
                }
                FetchResult::from_error(&error)
            }
        }
    }

    /// Fetches a [`FetchRequest`]
    pub async fn fetch_request(&self, request: &FetchRequest) -> FetchResult {
        self.fetch(&request.url, Some(request.preferred_strategy)).await
    }

    /// Closes the shared browser and forgets all robots.txt and domain state
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down orchestrator");
        self.browser.shutdown().await;
        self.robots.clear();
        self.limiter.clear().await;
    }

    fn resolve_strategy(&self, strategy: FetchStrategy) -> Strategy {
        match strategy {
            FetchStrategy::SimpleHttp => Strategy::Http,
            FetchStrategy::ScriptedBrowser => Strategy::Browser,
            FetchStrategy::Auto if self.config.fetcher.use_browser_by_default => Strategy::Browser,
            FetchStrategy::Auto => Strategy::Http,
        }
    }

    fn is_retryable(&self, error: &FetchError) -> bool {
        self.retry_on.contains(&error.kind())
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        strategy: Strategy,
    ) -> Result<FetchedPage, FetchError> {
        let (parsed, domain) = parse_fetch_url(url).map_err(|e| {
            tracing::warn!("Rejecting '{}': {}", url, e);
            FetchError::InvalidUrl {
                url: url.to_string(),
            }
        })?;

        tracing::debug!("Fetching {} via {:?}", parsed, strategy);
        retry(
            &self.retry_policy,
            parsed.as_str(),
            |e| self.is_retryable(e),
            || self.fetch_once(&parsed, &domain, strategy),
        )
        .await
    }

    async fn fetch_once(
        &self,
        url: &Url,
        domain: &str,
        strategy: Strategy,
    ) -> Result<FetchedPage, FetchError> {
        if self.config.robots.respect {
            let user_agent = &self.config.robots.user_agent;
            if !self.robots.is_allowed(url, user_agent).await {
                tracing::warn!("Skipping {}: disallowed by robots.txt", url);
                return Err(FetchError::RobotsDisallowed {
                    url: url.to_string(),
                    user_agent: user_agent.clone(),
                });
            }
        }

        let permit = self
            .limiter
            .acquire(domain)
            .await
            .map_err(|e| FetchError::Unexpected {
                url: url.to_string(),
                message: format!("rate limiter closed: {}", e),
            })?;

        let page = match strategy {
            Strategy::Http => self.http.fetch(url.as_str()).await,
            Strategy::Browser => self.browser.fetch(url.as_str()).await,
        };
        permit.release();
        let page = page?;

        if let Some(phrase) = detect_captcha(&page.body) {
            tracing::warn!(
                "Possible CAPTCHA on {} (matched '{}'), returning content as-is",
                page.final_url,
                phrase
            );
        }

        Ok(page)
    }
}
