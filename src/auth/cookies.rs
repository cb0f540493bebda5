//! Page cookies as reported by the host
//!
//! The host (extension background or an embedding webview) reads the cookie
//! store for the active page and hands it over through [`CookieSource`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur while reading cookies
#[derive(Debug, Error)]
pub enum CookieError {
    /// The host could not read the cookie store
    #[error("Cookie store unavailable: {0}")]
    Unavailable(String),
}

/// A single cookie from the page's cookie store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Expiration as Unix seconds; absent for session cookies
    #[serde(default, rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Creates a host-less session cookie, mostly useful in tests
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: default_path(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }
}

/// The cookie set of a page at one poll tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Returns the first cookie with the given name
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Returns the value of a cookie when it is present and non-empty
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name)
            .map(|c| c.value.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Hash over every cookie in the jar
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.cookies.iter())
    }

    /// Hash over the named cookies only
    ///
    /// Providers use this to ignore analytics cookies that rotate on every
    /// request.
    pub fn fingerprint_of(&self, names: &[&str]) -> Fingerprint {
        Fingerprint::of(self.cookies.iter().filter(|c| names.contains(&c.name.as_str())))
    }

    pub fn into_vec(self) -> Vec<Cookie> {
        self.cookies
    }
}

impl From<Vec<Cookie>> for CookieJar {
    fn from(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self {
            cookies: iter.into_iter().collect(),
        }
    }
}

/// SHA-256 over a cookie set, used only to detect changes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn of<'a>(cookies: impl Iterator<Item = &'a Cookie>) -> Self {
        let mut pairs: Vec<(&str, &str)> = cookies
            .map(|c| (c.name.as_str(), c.value.as_str()))
            .collect();
        // Order in the store is not stable across reads
        pairs.sort_unstable();

        let mut hasher = Sha256::new();
        for (name, value) in pairs {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        Self(hasher.finalize().into())
    }

    /// First 8 hex chars, enough to tell snapshots apart in logs
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Where the watcher reads page cookies from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CookieSource: Send + Sync {
    /// Returns the cookies visible to the given page URL
    async fn cookies(&self, url: &str) -> Result<CookieJar, CookieError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar(pairs: &[(&str, &str)]) -> CookieJar {
        pairs.iter().map(|(n, v)| Cookie::new(*n, *v)).collect()
    }

    #[test]
    fn test_value_ignores_empty() {
        let jar = jar(&[("sessionKey", ""), ("other", "x")]);
        assert!(jar.get("sessionKey").is_some());
        assert_eq!(jar.value("sessionKey"), None);
        assert_eq!(jar.value("other"), Some("x"));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = jar(&[("a", "1"), ("b", "2")]);
        let b = jar(&[("b", "2"), ("a", "1")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_value() {
        let a = jar(&[("a", "1")]);
        let b = jar(&[("a", "2")]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_of_ignores_untracked() {
        let a = jar(&[("sessionKey", "s"), ("_ga", "1")]);
        let b = jar(&[("sessionKey", "s"), ("_ga", "2")]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.fingerprint_of(&["sessionKey"]),
            b.fingerprint_of(&["sessionKey"])
        );
    }

    #[test]
    fn test_fingerprint_display_is_hex() {
        let fp = jar(&[("a", "1")]).fingerprint();
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with(&fp.short()));
    }

    #[test]
    fn test_deserialize_extension_cookie() {
        let json = r#"[{
            "name": "sessionKey",
            "value": "sk-ant-sid01-xyz",
            "domain": ".claude.ai",
            "path": "/",
            "expirationDate": 1767225600.5,
            "secure": true,
            "httpOnly": true,
            "sameSite": "lax"
        }]"#;

        let jar: CookieJar = serde_json::from_str(json).unwrap();
        let cookie = jar.get("sessionKey").unwrap();
        assert_eq!(cookie.domain, ".claude.ai");
        assert_eq!(cookie.expires, Some(1767225600.5));
        assert!(cookie.http_only);
    }
}
