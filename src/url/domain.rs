use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The domain keys per-domain rate limiting.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use polite_fetch::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the authority (`host[:port]`) that serves a URL's robots.txt
///
/// Default ports are omitted, so `https://example.com:443/` and
/// `https://example.com/` share one robots.txt entry.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use polite_fetch::url::robots_authority;
///
/// let url = Url::parse("http://127.0.0.1:8080/private/x").unwrap();
/// assert_eq!(robots_authority(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn robots_authority(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
