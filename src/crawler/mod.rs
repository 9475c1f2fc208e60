//! Crawler module for polite page fetching
//!
//! This module contains the fetch pipeline, including:
//! - Per-domain rate limiting
//! - The simple HTTP and scripted browser fetch strategies
//! - Challenge-page detection
//! - Overall fetch orchestration with retries

mod browser;
mod captcha;
mod fetcher;
mod limiter;
mod orchestrator;

pub use browser::{BrowserOptions, SharedBrowser};
pub use captcha::detect_captcha;
pub use fetcher::{browser_headers, build_http_client, FetchedPage, HttpFetcher, MAX_REDIRECTS};
pub use limiter::{DomainPermit, DomainRateLimiter};
pub use orchestrator::{FetchRequest, FetchResult, FetchStrategy, Orchestrator};
