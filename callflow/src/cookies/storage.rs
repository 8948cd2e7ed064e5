//! Cookie storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::cookie::{Cookie, CookieError, RequestUrl};

/// Where a client keeps cookies between requests.
#[async_trait]
pub trait CookiesStorage: Send + Sync {
    /// Cookies that should be sent to `url`.
    async fn get(&self, url: &RequestUrl) -> Result<Vec<Cookie>, CookieError>;

    /// Stores a cookie received from `url`.
    async fn add_cookie(&self, url: &RequestUrl, cookie: Cookie) -> Result<(), CookieError>;
}

/// In-memory storage that keeps every cookie it is given.
///
/// A cookie replaces an earlier one with the same name, domain and path.
#[derive(Debug, Default)]
pub struct AcceptAllCookiesStorage {
    cookies: RwLock<Vec<Cookie>>,
}

impl AcceptAllCookiesStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }
}

#[async_trait]
impl CookiesStorage for AcceptAllCookiesStorage {
    async fn get(&self, url: &RequestUrl) -> Result<Vec<Cookie>, CookieError> {
        let cookies = self.cookies.read();
        let mut matching = Vec::new();
        for cookie in cookies.iter() {
            if cookie.matches(url)? {
                matching.push(cookie.clone());
            }
        }
        Ok(matching)
    }

    async fn add_cookie(&self, url: &RequestUrl, cookie: Cookie) -> Result<(), CookieError> {
        let cookie = cookie.fill_defaults(url);
        trace!(name = %cookie.name, domain = ?cookie.domain, path = ?cookie.path, "Storing cookie");

        let mut cookies = self.cookies.write();
        cookies.retain(|existing| {
            !(existing.name == cookie.name
                && existing.domain == cookie.domain
                && existing.path == cookie.path)
        });
        cookies.push(cookie);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(s: &str) -> RequestUrl {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_stored_cookie_matches_subdomain_only() {
        let storage = AcceptAllCookiesStorage::new();
        let cookie = Cookie::new("session", "abc").with_domain("example.com").with_path("/");
        storage.add_cookie(&url("https://example.com/login"), cookie.clone()).await.unwrap();

        assert_eq!(storage.get(&url("https://sub.example.com/foo")).await.unwrap(), vec![cookie]);
        assert!(storage.get(&url("https://other.com/foo")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_filled_on_insert() {
        let storage = AcceptAllCookiesStorage::new();
        storage
            .add_cookie(&url("https://shop.example.com/cart"), Cookie::new("cart", "3"))
            .await
            .unwrap();

        assert_eq!(storage.get(&url("https://shop.example.com/cart/items")).await.unwrap().len(), 1);
        assert!(storage.get(&url("https://shop.example.com/account")).await.unwrap().is_empty());
        assert!(storage.get(&url("https://example.com/cart")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_later_cookie_replaces_earlier() {
        let storage = AcceptAllCookiesStorage::new();
        let origin = url("https://example.com/");
        storage.add_cookie(&origin, Cookie::new("theme", "light")).await.unwrap();
        storage.add_cookie(&origin, Cookie::new("theme", "dark")).await.unwrap();
        storage
            .add_cookie(&origin, Cookie::new("theme", "blue").with_path("/admin"))
            .await
            .unwrap();

        assert_eq!(storage.len(), 2);
        let values: Vec<_> = storage
            .get(&url("https://example.com/"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.value)
            .collect();
        assert_eq!(values, vec!["dark"]);
    }
}
