//! Simple HTTP fetch strategy
//!
//! This module handles plain HTTP requests, including:
//! - Building one pooled client shared by every fetch
//! - Rotating the User-Agent header per request
//! - Browser-like request headers
//! - Redirect following (max 10 hops)
//! - Error classification into [`FetchError`] variants

use crate::config::FetcherConfig;
use crate::FetchError;
use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, DNT, REFERER, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};
use reqwest::{redirect::Policy, Client, Proxy};
use std::time::Duration;

/// Maximum redirect hops followed for a single fetch
pub const MAX_REDIRECTS: usize = 10;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const GOOGLE_REFERER: &str = "https://www.google.com/";

/// A page successfully fetched by one of the strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Page body as text
    pub body: String,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
}

/// HTTP fetch strategy backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpFetcher {
    /// Builds the fetcher from the `[fetcher]` configuration section
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Client built successfully
    /// * `Err(reqwest::Error)` - Proxy URL rejected or TLS backend failed
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config.timeout(), config.proxy_url.as_deref())?;
        Ok(Self::with_client(client, config.user_agent_pool()))
    }

    /// Wraps an existing client
    pub fn with_client(client: Client, user_agents: Vec<String>) -> Self {
        Self {
            client,
            user_agents,
        }
    }

    /// Picks a User-Agent for the next request
    pub fn random_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    /// Fetches a URL, following redirects
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Non-2xx final status | `HttpStatus` (final URL, upstream code) |
    /// | Client timeout | `Timeout` |
    /// | DNS, connect, TLS, too many redirects | `Transport` |
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut request = self.client.get(url).headers(browser_headers());
        if let Some(user_agent) = self.random_user_agent() {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await.map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            tracing::warn!("HTTP {} for {}", status.as_u16(), final_url);
            return Err(FetchError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&final_url, e))?;

        tracing::info!(
            "Fetched {} with status {} ({} bytes)",
            final_url,
            status.as_u16(),
            body.len()
        );

        Ok(FetchedPage {
            body,
            status: status.as_u16(),
            final_url,
        })
    }
}

/// Builds the shared HTTP client
///
/// Compression is negotiated by reqwest itself, so `Accept-Encoding` is not
/// part of [`browser_headers`].
pub fn build_http_client(
    timeout: Duration,
    proxy_url: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy_url {
        builder = builder.proxy(Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// Request headers mimicking a desktop browser's top-level navigation
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(REFERER, HeaderValue::from_static(GOOGLE_REFERER));
    headers
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        tracing::warn!("Request timeout for {}", url);
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        tracing::warn!("Transport error for {}: {}", url, error);
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
