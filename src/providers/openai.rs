//! OpenAI session profile (ChatGPT and Sora)
//!
//! The NextAuth session token is split into `.0`/`.1` chunks once it grows
//! past the cookie size limit, so both forms count as signed in. API calls
//! from the page use a separate bearer token, which the host captures.

use super::base::ProviderProfile;
use crate::auth::{CookieJar, Fingerprint, SessionIdentifiers};

const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
const SESSION_CHUNK_0: &str = "__Secure-next-auth.session-token.0";
const SESSION_CHUNK_1: &str = "__Secure-next-auth.session-token.1";
const DEVICE_COOKIE: &str = "oai-did";

/// OpenAI (chatgpt.com, sora.com)
#[derive(Debug, Default)]
pub struct OpenAIProfile;

impl OpenAIProfile {
    pub fn new() -> Self {
        Self
    }
}

impl ProviderProfile for OpenAIProfile {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["chatgpt.com", "sora.com", "sora.chatgpt.com"]
    }

    fn is_authenticated(&self, jar: &CookieJar) -> bool {
        jar.has_value(SESSION_COOKIE) || jar.has_value(SESSION_CHUNK_0)
    }

    fn fingerprint(&self, jar: &CookieJar) -> Fingerprint {
        jar.fingerprint_of(&[SESSION_COOKIE, SESSION_CHUNK_0, SESSION_CHUNK_1])
    }

    fn session_identifiers(&self, jar: &CookieJar) -> SessionIdentifiers {
        let mut ids = SessionIdentifiers::new();
        if let Some(device) = jar.value(DEVICE_COOKIE) {
            ids.insert("deviceId".to_string(), device.to_string());
        }
        ids
    }

    fn uses_bearer_token(&self) -> bool {
        true
    }
}
