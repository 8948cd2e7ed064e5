//! Cookies and the rules deciding which request URLs they apply to.

use http::Uri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while matching or storing cookies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    /// The cookie has no domain; call [`Cookie::fill_defaults`] first.
    #[error("Cookie '{0}' has no domain")]
    MissingDomain(String),

    /// The cookie has no path; call [`Cookie::fill_defaults`] first.
    #[error("Cookie '{0}' has no path")]
    MissingPath(String),

    /// The URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// The scheme of a request URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlProtocol {
    /// `http`
    Http,
    /// `https`
    Https,
    /// `ws`
    Ws,
    /// `wss`
    Wss,
    /// Anything else, lowercased.
    Other(String),
}

impl UrlProtocol {
    /// Parses a scheme name, case-insensitively.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "https" => Self::Https,
            "ws" => Self::Ws,
            "wss" => Self::Wss,
            other => Self::Other(other.to_string()),
        }
    }

    /// True for `https` and `wss`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Https | Self::Wss)
    }

    /// The scheme name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::Other(scheme) => scheme,
        }
    }
}

impl fmt::Display for UrlProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a request URL that cookie matching looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    /// Scheme.
    pub protocol: UrlProtocol,
    /// Host, lowercased.
    pub host: String,
    /// Percent-encoded path; `/` when the URL has none.
    pub encoded_path: String,
}

impl RequestUrl {
    /// Extracts the matching parts of an absolute `uri`.
    pub fn from_uri(uri: &Uri) -> Result<Self, CookieError> {
        let invalid = |reason: &str| CookieError::InvalidUrl {
            url: uri.to_string(),
            reason: reason.to_string(),
        };

        let scheme = uri.scheme_str().ok_or_else(|| invalid("missing scheme"))?;
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let path = uri.path();

        Ok(Self {
            protocol: UrlProtocol::from_scheme(scheme),
            host: host.to_ascii_lowercase(),
            encoded_path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        })
    }
}

impl FromStr for RequestUrl {
    type Err = CookieError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let uri: Uri = url.parse().map_err(|error: http::uri::InvalidUri| CookieError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
        Self::from_uri(&uri)
    }
}

/// A client-side cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie applies to, including its subdomains.
    #[serde(default)]
    pub domain: Option<String>,
    /// Path prefix the cookie applies to.
    #[serde(default)]
    pub path: Option<String>,
    /// Only sent over secure protocols.
    #[serde(default)]
    pub secure: bool,
    /// Only sent over plain `http`.
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// Creates a cookie with no domain, no path and no flags.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    /// Sets the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Marks the cookie secure.
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Marks the cookie http-only.
    #[must_use]
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    /// Decides whether this cookie should be sent to `url`.
    ///
    /// Note that an http-only cookie matches plain `http` only; `https` and
    /// the websocket schemes never match it.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain or path has not been filled in.
    pub fn matches(&self, url: &RequestUrl) -> Result<bool, CookieError> {
        let domain = self
            .domain
            .as_deref()
            .ok_or_else(|| CookieError::MissingDomain(self.name.clone()))?;
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| CookieError::MissingPath(self.name.clone()))?;

        let domain = domain.to_ascii_lowercase();
        let host_matches = url.host == domain
            || url
                .host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'));
        if !host_matches {
            return Ok(false);
        }

        let path_matches = path == "/"
            || url.encoded_path == path
            || url
                .encoded_path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('/'));
        if !path_matches {
            return Ok(false);
        }

        if self.secure && !url.protocol.is_secure() {
            return Ok(false);
        }
        if self.http_only && url.protocol != UrlProtocol::Http {
            return Ok(false);
        }
        Ok(true)
    }

    /// Fills a missing path from the url's path and a missing or blank
    /// domain from its host. A given domain is lowercased.
    #[must_use]
    pub fn fill_defaults(mut self, url: &RequestUrl) -> Self {
        if self.path.is_none() {
            self.path = Some(url.encoded_path.clone());
        }
        self.domain = match self.domain.take() {
            Some(domain) if !domain.trim().is_empty() => Some(domain.to_ascii_lowercase()),
            _ => Some(url.host.clone()),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(s: &str) -> RequestUrl {
        s.parse().unwrap()
    }

    fn site_cookie() -> Cookie {
        Cookie::new("session", "abc").with_domain("example.com").with_path("/")
    }

    #[test]
    fn test_parse_request_url() {
        let parsed = url("HTTPS://Sub.Example.com/foo%20bar?x=1");
        assert_eq!(parsed.protocol, UrlProtocol::Https);
        assert_eq!(parsed.host, "sub.example.com");
        assert_eq!(parsed.encoded_path, "/foo%20bar");

        assert_eq!(url("http://example.com").encoded_path, "/");
        assert!(matches!("/relative".parse::<RequestUrl>(), Err(CookieError::InvalidUrl { .. })));
    }

    #[test]
    fn test_domain_matching() {
        let cookie = site_cookie();
        assert!(cookie.matches(&url("https://sub.example.com/foo")).unwrap());
        assert!(cookie.matches(&url("https://example.com/foo")).unwrap());
        assert!(!cookie.matches(&url("https://other.com/foo")).unwrap());
        assert!(!cookie.matches(&url("https://badexample.com/foo")).unwrap());
    }

    #[test]
    fn test_domain_matching_ignores_case() {
        let cookie = site_cookie().with_domain("Example.COM");
        assert!(cookie.matches(&url("https://example.com/")).unwrap());
        assert!(cookie.matches(&url("https://Sub.Example.com/")).unwrap());
        assert!(!cookie.matches(&url("https://other.com/")).unwrap());

        let filled = cookie.fill_defaults(&url("https://example.com/"));
        assert_eq!(filled.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_path_matching() {
        let cookie = site_cookie().with_path("/api");
        assert!(cookie.matches(&url("http://example.com/api")).unwrap());
        assert!(cookie.matches(&url("http://example.com/api/users")).unwrap());
        assert!(!cookie.matches(&url("http://example.com/apix")).unwrap());
        assert!(!cookie.matches(&url("http://example.com/")).unwrap());
    }

    #[test]
    fn test_secure_requires_secure_protocol() {
        let cookie = site_cookie().secure();
        assert!(cookie.matches(&url("https://example.com/")).unwrap());
        assert!(cookie.matches(&url("wss://example.com/")).unwrap());
        assert!(!cookie.matches(&url("http://example.com/")).unwrap());
        assert!(!cookie.matches(&url("ws://example.com/")).unwrap());
    }

    #[test]
    fn test_http_only_requires_plain_http() {
        let cookie = site_cookie().http_only();
        assert!(cookie.matches(&url("http://example.com/")).unwrap());
        assert!(!cookie.matches(&url("https://example.com/")).unwrap());
        assert!(!cookie.matches(&url("ws://example.com/")).unwrap());
    }

    #[test]
    fn test_missing_defaults_is_an_error() {
        let target = url("https://example.com/");
        assert_eq!(
            Cookie::new("a", "1").with_path("/").matches(&target),
            Err(CookieError::MissingDomain("a".into()))
        );
        assert_eq!(
            Cookie::new("a", "1").with_domain("example.com").matches(&target),
            Err(CookieError::MissingPath("a".into()))
        );
    }

    #[test]
    fn test_fill_defaults() {
        let target = url("https://shop.example.com/cart/items");

        let filled = Cookie::new("a", "1").fill_defaults(&target);
        assert_eq!(filled.domain.as_deref(), Some("shop.example.com"));
        assert_eq!(filled.path.as_deref(), Some("/cart/items"));

        let filled = Cookie::new("a", "1")
            .with_domain("  ")
            .with_path("/")
            .fill_defaults(&target);
        assert_eq!(filled.domain.as_deref(), Some("shop.example.com"));
        assert_eq!(filled.path.as_deref(), Some("/"));

        let kept = site_cookie().fill_defaults(&target);
        assert_eq!(kept, site_cookie());
    }
}
