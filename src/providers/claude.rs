//! Claude session profile
//!
//! claude.ai keeps the login in the `sessionKey` cookie (`sk-ant-sid…`).
//! The active organization is tracked in `lastActiveOrg`.

use super::base::ProviderProfile;
use crate::auth::{CookieJar, Fingerprint, SessionIdentifiers};

const SESSION_COOKIE: &str = "sessionKey";
const ORG_COOKIE: &str = "lastActiveOrg";
const SESSION_PREFIX: &str = "sk-ant-";

/// Claude (claude.ai)
#[derive(Debug, Default)]
pub struct ClaudeProfile;

impl ClaudeProfile {
    pub fn new() -> Self {
        Self
    }
}

impl ProviderProfile for ClaudeProfile {
    fn id(&self) -> &'static str {
        "claude"
    }

    fn name(&self) -> &'static str {
        "Claude"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["claude.ai"]
    }

    fn is_authenticated(&self, jar: &CookieJar) -> bool {
        jar.value(SESSION_COOKIE)
            .is_some_and(|v| v.starts_with(SESSION_PREFIX))
    }

    fn fingerprint(&self, jar: &CookieJar) -> Fingerprint {
        jar.fingerprint_of(&[SESSION_COOKIE, ORG_COOKIE])
    }

    fn session_identifiers(&self, jar: &CookieJar) -> SessionIdentifiers {
        let mut ids = SessionIdentifiers::new();
        if let Some(org) = jar.value(ORG_COOKIE) {
            ids.insert("organizationId".to_string(), org.to_string());
        }
        ids
    }

    fn required_identifiers(&self) -> &'static [&'static str] {
        &["organizationId"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Cookie;

    #[test]
    fn test_authenticated_requires_session_prefix() {
        let p = ClaudeProfile::new();
        let signed_in = CookieJar::from(vec![Cookie::new(SESSION_COOKIE, "sk-ant-sid01-abc")]);
        let junk = CookieJar::from(vec![Cookie::new(SESSION_COOKIE, "deleted")]);

        assert!(p.is_authenticated(&signed_in));
        assert!(!p.is_authenticated(&junk));
        assert!(!p.is_authenticated(&CookieJar::new()));
    }

    #[test]
    fn test_organization_identifier() {
        let p = ClaudeProfile::new();
        let jar = CookieJar::from(vec![
            Cookie::new(SESSION_COOKIE, "sk-ant-sid01-abc"),
            Cookie::new(ORG_COOKIE, "5f1e-org"),
        ]);

        let ids = p.session_identifiers(&jar);
        assert_eq!(ids.get("organizationId").map(String::as_str), Some("5f1e-org"));
    }

    #[test]
    fn test_fingerprint_ignores_analytics() {
        let p = ClaudeProfile::new();
        let a = CookieJar::from(vec![
            Cookie::new(SESSION_COOKIE, "sk-ant-1"),
            Cookie::new("__ssid", "a"),
        ]);
        let b = CookieJar::from(vec![
            Cookie::new(SESSION_COOKIE, "sk-ant-1"),
            Cookie::new("__ssid", "b"),
        ]);

        assert_eq!(p.fingerprint(&a), p.fingerprint(&b));
    }
}
