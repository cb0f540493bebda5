//! Base types and traits for tracked providers
//!
//! A provider is a third-party site whose login session we follow. Each one
//! knows which hosts it lives on and how to tell a signed-in cookie set from a
//! signed-out one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::{CookieJar, Fingerprint, SessionIdentifiers};

/// Opaque provider identifier as used by the backend (e.g. "claude")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Session rules for one provider
pub trait ProviderProfile: Send + Sync {
    /// Backend identifier (e.g., "claude")
    fn id(&self) -> &'static str;

    /// Display name (e.g., "Claude")
    fn name(&self) -> &'static str;

    /// Registrable domains this provider serves pages from
    fn domains(&self) -> &'static [&'static str];

    /// Whether the cookie set belongs to a signed-in user
    fn is_authenticated(&self, jar: &CookieJar) -> bool;

    /// Hash used for change detection
    ///
    /// Defaults to the whole jar; override to track session cookies only.
    fn fingerprint(&self, jar: &CookieJar) -> Fingerprint {
        jar.fingerprint()
    }

    /// Extra identifiers the backend needs next to the raw cookies
    fn session_identifiers(&self, _jar: &CookieJar) -> SessionIdentifiers {
        SessionIdentifiers::new()
    }

    /// Identifier keys an import is incomplete without
    fn required_identifiers(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether the backend also needs a bearer token captured from the page
    fn uses_bearer_token(&self) -> bool {
        false
    }

    /// Returns true when `host` is one of the domains or a subdomain of one
    fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains().iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Metadata about a provider (serializable)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub id: String,
    pub name: String,
    pub domains: Vec<String>,
    pub uses_bearer_token: bool,
}

impl ProviderMetadata {
    pub fn of(profile: &dyn ProviderProfile) -> Self {
        Self {
            id: profile.id().to_string(),
            name: profile.name().to_string(),
            domains: profile.domains().iter().map(|d| d.to_string()).collect(),
            uses_bearer_token: profile.uses_bearer_token(),
        }
    }
}
