//! Suno session profile
//!
//! Suno signs in through Clerk. `__client_uat` holds the last sign-in time and
//! is reset to `0` on sign-out, which makes it a better signal than the
//! short-lived `__session` JWT.

use super::base::ProviderProfile;
use crate::auth::{CookieJar, Fingerprint};

const UAT_COOKIE: &str = "__client_uat";
const SESSION_COOKIE: &str = "__session";

/// Suno (suno.com)
#[derive(Debug, Default)]
pub struct SunoProfile;

impl SunoProfile {
    pub fn new() -> Self {
        Self
    }
}

impl ProviderProfile for SunoProfile {
    fn id(&self) -> &'static str {
        "suno"
    }

    fn name(&self) -> &'static str {
        "Suno"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["suno.com"]
    }

    fn is_authenticated(&self, jar: &CookieJar) -> bool {
        jar.value(UAT_COOKIE).is_some_and(|v| v != "0")
    }

    // The JWT in __session refreshes every minute; only a new sign-in matters.
    fn fingerprint(&self, jar: &CookieJar) -> Fingerprint {
        jar.fingerprint_of(&[UAT_COOKIE])
    }

    fn uses_bearer_token(&self) -> bool {
        true
    }
}
