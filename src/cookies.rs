//! Cookie provider seam for authenticated fetches
//!
//! Some sources require browser session cookies to serve media. Extracting
//! cookies from a browser profile is the job of an external collaborator;
//! this module only defines the seam the fetcher consults per request, plus
//! two built-in implementations: [`NoCookies`] (the default) and
//! [`StaticCookies`] (a fixed host-to-header map, useful for tests and for
//! callers that obtained a cookie string elsewhere).

use std::collections::HashMap;
use url::Url;

/// Source of `Cookie` header values, consulted once per fetch request
pub trait CookieProvider: Send + Sync {
    /// The `Cookie` header value to send for this URL, if any
    fn cookie_header(&self, url: &Url) -> Option<String>;

    /// Name of this provider implementation (for logging)
    fn name(&self) -> &str;
}

/// Provider that never supplies cookies
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCookies;

impl CookieProvider for NoCookies {
    fn cookie_header(&self, _url: &Url) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Fixed mapping from host to a ready-made `Cookie` header value
///
/// Lookup matches the exact host first, then parent domains, so an entry
/// for `example.com` also applies to `media.example.com`.
#[derive(Clone, Debug, Default)]
pub struct StaticCookies {
    by_host: HashMap<String, String>,
}

impl StaticCookies {
    /// Create an empty cookie map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `Cookie` header value for a host
    pub fn insert(&mut self, host: impl Into<String>, header: impl Into<String>) {
        self.by_host.insert(host.into(), header.into());
    }

    /// Number of registered hosts
    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    /// Whether any hosts are registered
    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

impl CookieProvider for StaticCookies {
    fn cookie_header(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if let Some(header) = self.by_host.get(host) {
            return Some(header.clone());
        }
        // Walk up parent domains: media.example.com -> example.com
        let mut rest = host;
        while let Some((_, parent)) = rest.split_once('.') {
            if let Some(header) = self.by_host.get(parent) {
                return Some(header.clone());
            }
            rest = parent;
        }
        None
    }

    fn name(&self) -> &str {
        "static"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cookies_returns_none() {
        let url = Url::parse("https://example.com/ep.mp3").unwrap();
        assert_eq!(NoCookies.cookie_header(&url), None);
    }

    #[test]
    fn static_cookies_match_exact_host() {
        let mut cookies = StaticCookies::new();
        cookies.insert("example.com", "session=abc");

        let url = Url::parse("https://example.com/ep.mp3").unwrap();
        assert_eq!(cookies.cookie_header(&url), Some("session=abc".to_string()));
    }

    #[test]
    fn static_cookies_match_parent_domain() {
        let mut cookies = StaticCookies::new();
        cookies.insert("example.com", "session=abc");

        let url = Url::parse("https://media.cdn.example.com/ep.mp3").unwrap();
        assert_eq!(
            cookies.cookie_header(&url),
            Some("session=abc".to_string()),
            "entry for example.com should apply to subdomains"
        );
    }

    #[test]
    fn static_cookies_do_not_leak_across_hosts() {
        let mut cookies = StaticCookies::new();
        cookies.insert("example.com", "session=abc");

        let url = Url::parse("https://other.org/ep.mp3").unwrap();
        assert_eq!(cookies.cookie_header(&url), None);
    }
}
