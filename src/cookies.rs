//! Session cookie jar.
//!
//! The flow endpoint round-trips login state through cookies, so the engine
//! keeps its own jar instead of delegating to the HTTP client: the login
//! orchestrator has to purge individual stale cookies before a new attempt,
//! and logout replaces the jar wholesale.

use std::collections::BTreeMap;

use cookie::Cookie;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::trace;

/// Cookie jar keyed by cookie name.
///
/// Absorbs `Set-Cookie` response headers and re-emits a `Cookie` request
/// header. Later cookies with the same name overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie<'static>>,
}

impl CookieJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb every `Set-Cookie` header from a response.
    ///
    /// Unparseable headers are skipped; the endpoint occasionally emits
    /// malformed tracking cookies and they carry no login state.
    pub fn store_response_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            match Cookie::parse(raw.to_owned()) {
                Ok(parsed) => {
                    trace!(name = %parsed.name(), "storing response cookie");
                    self.cookies.insert(parsed.name().to_owned(), parsed);
                }
                Err(err) => trace!(%err, "skipping unparseable Set-Cookie header"),
            }
        }
    }

    /// Render the jar as a `Cookie` request header value.
    ///
    /// Returns `None` when the jar is empty so callers can omit the header.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .values()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect();
        Some(pairs.join("; "))
    }

    /// Look up a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    /// Remove a cookie by name.
    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    /// Drop every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Number of cookies held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(SET_COOKIE, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn absorbs_and_reemits_cookies() {
        let mut jar = CookieJar::new();
        jar.store_response_cookies(&headers(&[
            "guest_id=v1%3A1700000000; Path=/; Domain=.twitter.com; Secure",
            "att=1-abc; Path=/; HttpOnly",
        ]));

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("att"), Some("1-abc"));
        let header = jar.header_value().unwrap();
        assert!(header.contains("guest_id=v1%3A1700000000"));
        assert!(header.contains("att=1-abc"));
    }

    #[test]
    fn same_name_overwrites() {
        let mut jar = CookieJar::new();
        jar.store_response_cookies(&headers(&["ct0=first; Path=/"]));
        jar.store_response_cookies(&headers(&["ct0=second; Path=/"]));

        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("ct0"), Some("second"));
    }

    #[test]
    fn empty_jar_emits_no_header() {
        let mut jar = CookieJar::new();
        assert!(jar.header_value().is_none());

        jar.store_response_cookies(&headers(&["twid=u%3D1; Path=/"]));
        jar.remove("twid");
        assert!(jar.header_value().is_none());
    }

    #[test]
    fn malformed_headers_are_skipped() {
        let mut jar = CookieJar::new();
        jar.store_response_cookies(&headers(&["", "valid=yes; Path=/"]));
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("valid"), Some("yes"));
    }
}
