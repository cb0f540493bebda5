//! Shared state of one page session
//!
//! The navigation watcher writes the current URL and detected provider; the
//! session watcher reads them on every tick. Remote settings and captured
//! credentials live here too, so neither watcher owns global state.

use tokio::sync::RwLock;

use crate::auth::CredentialVault;
use crate::config::RemoteSettings;
use crate::providers::ProviderId;
use crate::security::{Sanitizer, SecureString};

#[derive(Debug, Default)]
struct PageView {
    url: Option<String>,
    provider: Option<ProviderId>,
}

/// Explicit context passed to watcher instances
#[derive(Default)]
pub struct SessionContext {
    page: RwLock<PageView>,
    settings: RwLock<RemoteSettings>,
    credentials: CredentialVault,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_url(&self) -> Option<String> {
        self.page.read().await.url.clone()
    }

    /// Provider detected for the current URL, if any
    pub async fn provider(&self) -> Option<ProviderId> {
        self.page.read().await.provider.clone()
    }

    /// Current URL and provider, read together
    pub async fn snapshot(&self) -> (Option<String>, Option<ProviderId>) {
        let page = self.page.read().await;
        (page.url.clone(), page.provider.clone())
    }

    /// Records a navigation
    ///
    /// Returns false when the URL is unchanged. On change the cached
    /// provider is invalidated until detection for the new URL completes.
    pub async fn begin_navigation(&self, url: &str) -> bool {
        let mut page = self.page.write().await;
        if page.url.as_deref() == Some(url) {
            return false;
        }
        page.url = Some(url.to_string());
        page.provider = None;
        true
    }

    /// Stores a detection result if `url` is still the current page
    ///
    /// Detection requests can overlap; a result for a page the user already
    /// left is dropped and false is returned.
    pub async fn complete_detection(&self, url: &str, provider: Option<ProviderId>) -> bool {
        let mut page = self.page.write().await;
        if page.url.as_deref() != Some(url) {
            tracing::debug!(
                "Dropping stale detection for {}",
                Sanitizer::sanitize_url(url)
            );
            return false;
        }
        page.provider = provider;
        true
    }

    pub async fn settings(&self) -> RemoteSettings {
        self.settings.read().await.clone()
    }

    pub async fn set_settings(&self, settings: RemoteSettings) {
        *self.settings.write().await = settings;
    }

    /// Records a bearer token the host captured for a provider
    pub async fn record_bearer_token(&self, provider: &ProviderId, token: SecureString) {
        self.credentials.record_bearer_token(provider, token).await;
    }

    pub async fn bearer_token(&self, provider: &ProviderId) -> Option<SecureString> {
        self.credentials.bearer_token(provider).await
    }

    /// Drops credentials captured for a provider (after logout)
    pub async fn clear_credentials(&self, provider: &ProviderId) {
        self.credentials.clear(provider).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigation_invalidates_provider() {
        let ctx = SessionContext::new();
        assert!(ctx.begin_navigation("https://claude.ai/new").await);
        assert!(ctx.complete_detection("https://claude.ai/new", Some("claude".into())).await);
        assert_eq!(ctx.provider().await, Some(ProviderId::from("claude")));

        assert!(!ctx.begin_navigation("https://claude.ai/new").await);
        assert_eq!(ctx.provider().await, Some(ProviderId::from("claude")));

        assert!(ctx.begin_navigation("https://claude.ai/chat/1").await);
        assert_eq!(ctx.provider().await, None);
    }

    #[tokio::test]
    async fn test_stale_detection_dropped() {
        let ctx = SessionContext::new();
        ctx.begin_navigation("https://suno.com/a").await;
        ctx.begin_navigation("https://example.com/").await;

        assert!(!ctx.complete_detection("https://suno.com/a", Some("suno".into())).await);
        assert_eq!(ctx.provider().await, None);
        assert_eq!(ctx.current_url().await.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_settings_and_credentials() {
        let ctx = SessionContext::new();
        assert!(ctx.settings().await.auto_import);

        ctx.set_settings(RemoteSettings {
            auto_import: false,
            ..RemoteSettings::default()
        })
        .await;
        assert!(!ctx.settings().await.auto_import);

        let openai = ProviderId::from("openai");
        ctx.record_bearer_token(&openai, "tok".into()).await;
        assert!(ctx.bearer_token(&openai).await.is_some());
        ctx.clear_credentials(&openai).await;
        assert!(ctx.bearer_token(&openai).await.is_none());
    }
}
