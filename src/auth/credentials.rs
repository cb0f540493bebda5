//! Captured credentials and the import payload sent to the backend

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::cookies::{Cookie, CookieJar};
use crate::providers::ProviderId;
use crate::security::SecureString;

/// Provider-specific identifiers pulled out of the cookie set
pub type SessionIdentifiers = BTreeMap<String, String>;

/// Bearer tokens the host captured from the page's own API traffic
///
/// Token capture is asynchronous relative to cookie polling, which is why
/// imports are scheduled with a delay.
#[derive(Default)]
pub struct CredentialVault {
    bearer_tokens: RwLock<HashMap<ProviderId, SecureString>>,
}

impl CredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest bearer token for a provider, replacing any older one
    pub async fn record_bearer_token(&self, provider: &ProviderId, token: SecureString) {
        if token.is_empty() {
            return;
        }
        tracing::debug!(provider = %provider, token = %token.redacted(), "Captured bearer token");
        self.bearer_tokens
            .write()
            .await
            .insert(provider.clone(), token);
    }

    pub async fn bearer_token(&self, provider: &ProviderId) -> Option<SecureString> {
        self.bearer_tokens.read().await.get(provider).cloned()
    }

    /// Drops everything captured for a provider
    pub async fn clear(&self, provider: &ProviderId) {
        self.bearer_tokens.write().await.remove(provider);
    }
}

/// The `rawData` of an `importCookies` message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub cookies: Vec<Cookie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<SecureString>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: SessionIdentifiers,
    pub captured_at: DateTime<Utc>,
}

impl ImportPayload {
    pub fn new(jar: CookieJar, captured_at: DateTime<Utc>) -> Self {
        Self {
            cookies: jar.into_vec(),
            bearer_token: None,
            identifiers: SessionIdentifiers::new(),
            captured_at,
        }
    }

    pub fn with_bearer_token(mut self, token: Option<SecureString>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_identifiers(mut self, identifiers: SessionIdentifiers) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// Encodes the payload as the JSON `rawData` value
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
