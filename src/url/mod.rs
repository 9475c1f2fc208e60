//! URL handling module for Polite-Fetch
//!
//! This module validates fetch targets and derives the keys used for
//! per-domain rate limiting and robots.txt caching.

mod domain;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, robots_authority};

/// Parses a fetch target and checks that a domain can be derived from it
///
/// Only `http` and `https` URLs with a host are accepted.
///
/// # Arguments
///
/// * `input` - The raw URL string supplied by the caller
///
/// # Returns
///
/// * `Ok((Url, String))` - The parsed URL and its lowercase domain
/// * `Err(UrlError)` - The input cannot be fetched
pub fn parse_fetch_url(input: &str) -> Result<(Url, String), UrlError> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    let domain = extract_domain(&url).ok_or(UrlError::MissingDomain)?;
    if domain.is_empty() {
        return Err(UrlError::MissingDomain);
    }

    Ok((url, domain))
}
