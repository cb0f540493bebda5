//! Gemini session profile
//!
//! Google sign-in is carried by `__Secure-1PSID`; the rotating
//! `__Secure-1PSIDTS` companion must travel with it for requests to succeed.

use super::base::ProviderProfile;
use crate::auth::{CookieJar, Fingerprint, SessionIdentifiers};

const SID_COOKIE: &str = "__Secure-1PSID";
const SIDTS_COOKIE: &str = "__Secure-1PSIDTS";

/// Gemini (gemini.google.com)
#[derive(Debug, Default)]
pub struct GeminiProfile;

impl GeminiProfile {
    pub fn new() -> Self {
        Self
    }
}

impl ProviderProfile for GeminiProfile {
    fn id(&self) -> &'static str {
        "gemini"
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["gemini.google.com"]
    }

    fn is_authenticated(&self, jar: &CookieJar) -> bool {
        jar.has_value(SID_COOKIE)
    }

    fn fingerprint(&self, jar: &CookieJar) -> Fingerprint {
        jar.fingerprint_of(&[SID_COOKIE, SIDTS_COOKIE])
    }

    fn session_identifiers(&self, jar: &CookieJar) -> SessionIdentifiers {
        let mut ids = SessionIdentifiers::new();
        if let Some(ts) = jar.value(SIDTS_COOKIE) {
            ids.insert("psidts".to_string(), ts.to_string());
        }
        ids
    }

    fn required_identifiers(&self) -> &'static [&'static str] {
        &["psidts"]
    }
}
