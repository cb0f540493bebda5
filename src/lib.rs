//! SessionBridge - Follow AI provider logins on the active page
//!
//! Watches the page a browser host is showing, recognizes AI provider sites
//! and keeps an account backend in step with the user's login there.
//!
//! ## Features
//!
//! - Provider detection per URL (Claude, ChatGPT/Sora, Gemini, Suno)
//! - Cookie polling with a debounced logout
//! - Delayed, rate-limited session import into the backend
//! - Page state saved across login reloads
//! - Account switcher data (sorted account list, recent assets)
//!
//! ## Architecture
//!
//! - **Agents**: Navigation and session watchers (background tasks)
//! - **Auth**: Cookie jars, fingerprints, captured credentials
//! - **Bridge**: Message protocol to the account backend
//! - **Providers**: Per-provider session rules
//! - **Storage**: Persisted keys behind an async key/value trait
//! - **Security**: Log sanitization and secret strings

pub mod agents;
pub mod auth;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod context;
pub mod providers;
pub mod security;
pub mod storage;
pub mod switcher;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use agents::{AgentError, AgentManager, NavigationEvent, NavigationSource, NavigationWatcher, SessionWatcher, Transition};
use auth::CookieSource;
use bridge::{AccountSummary, Backend, BackendEvent, BridgeError, HttpBackend};
use clock::{Clock, SystemClock};
use config::{BridgeConfig, RemoteSettings};
use context::SessionContext;
use providers::{ProviderId, ProviderRegistry};
use security::SecureString;
use storage::{PageState, PageStateStore, RecentAsset, RecentAssets, SortPreference, Storage, StorageError};
use switcher::AccountSwitcher;

const DEFAULT_LOG_FILTER: &str = "sessionbridge_lib=debug,info";

/// Installs the fmt subscriber
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// One page session: the watchers plus the stores they share
pub struct SessionBridge {
    config: BridgeConfig,
    context: Arc<SessionContext>,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    /// Agent manager for the watchers
    pub agent_manager: AgentManager,
    navigation: Arc<NavigationWatcher>,
    session: Arc<SessionWatcher>,
    page_state: PageStateStore,
    recent_assets: RecentAssets,
    switcher: AccountSwitcher,
}

impl SessionBridge {
    /// Creates a bridge using wall-clock time
    pub async fn new(
        config: BridgeConfig,
        backend: Arc<dyn Backend>,
        cookies: Arc<dyn CookieSource>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self::with_clock(config, backend, cookies, storage, Arc::new(SystemClock)).await
    }

    /// Creates a bridge that talks to the HTTP backend at `config.backend_url`
    pub async fn from_config(
        config: BridgeConfig,
        cookies: Arc<dyn CookieSource>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, BridgeError> {
        let url = config
            .backend_url
            .as_deref()
            .ok_or_else(|| BridgeError::Unavailable("no backend_url configured".to_string()))?;
        let backend = Arc::new(HttpBackend::http(url)?);
        Ok(Self::new(config, backend, cookies, storage).await)
    }

    pub async fn with_clock(
        config: BridgeConfig,
        backend: Arc<dyn Backend>,
        cookies: Arc<dyn CookieSource>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let context = Arc::new(SessionContext::new());
        let registry = Arc::new(ProviderRegistry::new());
        let agent_manager = AgentManager::new();

        let navigation = Arc::new(NavigationWatcher::new(
            context.clone(),
            backend.clone(),
            registry.clone(),
        ));
        let session = Arc::new(SessionWatcher::new(
            context.clone(),
            backend.clone(),
            cookies,
            registry,
            storage::RememberedAccounts::new(storage.clone()),
            clock.clone(),
            &config,
        ));

        agent_manager.register(navigation.clone()).await;
        agent_manager.register(session.clone()).await;

        Self {
            page_state: PageStateStore::new(storage.clone(), config.page_state_max_age()),
            recent_assets: RecentAssets::new(storage.clone(), config.recent_assets_limit),
            switcher: AccountSwitcher::new(storage),
            config,
            context,
            backend,
            clock,
            agent_manager,
            navigation,
            session,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn switcher(&self) -> &AccountSwitcher {
        &self.switcher
    }

    /// Loads remote settings and starts both watchers
    pub async fn start(&self) -> Result<(), AgentError> {
        tracing::info!("Starting session bridge...");
        self.refresh_settings().await;
        self.agent_manager.start_all().await
    }

    /// Stops both watchers; safe to call more than once
    pub async fn stop(&self) -> Result<(), AgentError> {
        self.agent_manager.stop_all().await
    }

    /// Fetches remote settings, keeping the previous ones on failure
    pub async fn refresh_settings(&self) -> RemoteSettings {
        match self.backend.get_settings().await {
            Ok(settings) => {
                tracing::debug!("Loaded remote settings: {:?}", settings);
                self.context.set_settings(settings.clone()).await;
                settings
            }
            Err(e) => {
                tracing::warn!("Failed to load remote settings: {}", e);
                self.context.settings().await
            }
        }
    }

    /// Channel the host reports navigations on while the bridge runs
    pub fn navigation_sender(&self) -> mpsc::Sender<NavigationEvent> {
        self.navigation.sender()
    }

    /// Handles a navigation right away, without the channel
    pub async fn observe_url(&self, url: &str, source: NavigationSource) -> Option<ProviderId> {
        self.navigation.observe(url, source).await
    }

    /// Takes one session reading right away
    pub async fn poll_session(&self) -> Vec<Transition> {
        self.session.poll_once().await
    }

    /// Sets a callback for session transitions
    pub async fn on_transition<F>(&self, callback: F)
    where
        F: Fn(&ProviderId, &Transition) + Send + Sync + 'static,
    {
        self.session.on_transition(callback).await;
    }

    /// Records a bearer token the host captured from the provider's API calls
    pub async fn record_bearer_token(&self, provider: &ProviderId, token: impl Into<SecureString>) {
        self.context.record_bearer_token(provider, token.into()).await;
    }

    /// Saves page state before a login-induced reload
    pub async fn save_page_state(&self, state: &PageState) -> Result<bool, StorageError> {
        self.page_state.save(state).await
    }

    /// Takes back page state saved for the current page
    pub async fn restore_page_state(&self) -> Result<Option<PageState>, StorageError> {
        let Some(url) = self.context.current_url().await else {
            return Ok(None);
        };
        self.page_state.restore(&url, self.clock.now()).await
    }

    /// Applies a message the backend pushed
    pub async fn handle_backend_event(&self, event: BackendEvent) {
        self.switcher.handle_event(event).await;
    }

    pub async fn record_asset(&self, asset: RecentAsset) -> Result<(), StorageError> {
        self.recent_assets.record(asset).await
    }

    pub async fn recent_assets(&self) -> Result<Vec<RecentAsset>, StorageError> {
        self.recent_assets.list().await
    }

    pub async fn set_sort_preference(&self, preference: SortPreference) -> Result<(), StorageError> {
        self.switcher.set_sort_preference(preference).await
    }

    /// Accounts the in-page switcher shows for the current provider
    ///
    /// `None` when the switcher is turned off in the remote settings or the
    /// page has no provider.
    pub async fn switcher_accounts(&self) -> Result<Option<Vec<AccountSummary>>, StorageError> {
        if !self.context.settings().await.show_account_switcher {
            return Ok(None);
        }
        let Some(provider) = self.context.provider().await else {
            return Ok(None);
        };
        self.switcher.accounts_for(&provider).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Cookie, CookieJar, MockCookieSource};
    use crate::bridge::{AccountCredits, AccountStatus, ImportOutcome, ImportedAccount, MockBackend};
    use crate::clock::ManualClock;
    use crate::storage::{AssetKind, MemoryStorage};
    use chrono::{DateTime, Utc};
    use mockall::predicate::eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn suno_jar() -> CookieJar {
        CookieJar::from(vec![Cookie::new("__client_uat", "1718000000")])
    }

    async fn bridge(backend: MockBackend, clock: ManualClock) -> SessionBridge {
        let mut cookies = MockCookieSource::new();
        cookies.expect_cookies().returning(|_| Ok(suno_jar()));

        SessionBridge::with_clock(
            BridgeConfig::default(),
            Arc::new(backend),
            Arc::new(cookies),
            Arc::new(MemoryStorage::new()),
            Arc::new(clock),
        )
        .await
    }

    #[tokio::test]
    async fn test_detect_import_and_switch() {
        let mut backend = MockBackend::new();
        backend
            .expect_detect_provider()
            .times(1)
            .returning(|_| Ok(Some(ProviderId::from("suno"))));
        backend
            .expect_import_cookies()
            .withf(|provider, _, raw| {
                provider.as_str() == "suno" && raw["bearerToken"] == "eyJhbGciOi"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(ImportOutcome {
                    account: Some(ImportedAccount {
                        id: "s-1".to_string(),
                        email: None,
                        display_name: Some("Studio".to_string()),
                    }),
                    created: false,
                })
            });
        backend
            .expect_update_account_status()
            .with(eq("s-1"), eq(AccountStatus::Active))
            .times(1)
            .returning(|_, _| Ok(()));
        backend.expect_sync_account_credits().times(1).returning(|id| {
            Ok(AccountCredits {
                account_id: id.to_string(),
                credits: 500.0,
            })
        });

        let clock = ManualClock::default();
        let bridge = bridge(backend, clock.clone()).await;
        let suno = ProviderId::from("suno");

        assert_eq!(
            bridge.observe_url("https://suno.com/create", NavigationSource::Initial).await,
            Some(suno.clone())
        );
        bridge.record_bearer_token(&suno, "eyJhbGciOi").await;

        bridge.poll_session().await;
        clock.advance_ms(2000);
        assert_eq!(bridge.poll_session().await, vec![Transition::ImportDue]);

        bridge
            .handle_backend_event(BackendEvent::AccountsUpdated {
                accounts: vec![AccountSummary {
                    id: "s-1".to_string(),
                    provider: suno.clone(),
                    label: "Studio".to_string(),
                    email: None,
                    credits: Some(500.0),
                    last_used_at: None,
                }],
            })
            .await;

        let active = bridge.switcher().active_account(&suno).await.unwrap();
        assert_eq!(active.map(|a| a.id), Some("s-1".to_string()));
    }

    #[tokio::test]
    async fn test_page_state_round_trip_through_reload() {
        let mut backend = MockBackend::new();
        backend
            .expect_detect_provider()
            .returning(|_| Ok(Some(ProviderId::from("suno"))));
        let clock = ManualClock::new(DateTime::<Utc>::default() + chrono::Duration::days(1));
        let bridge = bridge(backend, clock.clone()).await;

        bridge.observe_url("https://suno.com/create", NavigationSource::Initial).await;
        let state = PageState::new("https://suno.com/create", clock.now()).with_prompt("lofi beat");
        assert!(bridge.save_page_state(&state).await.unwrap());

        clock.advance_ms(30_000);
        let restored = bridge.restore_page_state().await.unwrap();
        assert_eq!(restored.and_then(|s| s.prompt), Some("lofi beat".to_string()));

        // One-shot
        assert!(bridge.restore_page_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_survives_settings_failure() {
        let mut backend = MockBackend::new();
        backend
            .expect_get_settings()
            .times(1)
            .returning(|| Err(BridgeError::Status(500)));
        let bridge = bridge(backend, ManualClock::default()).await;

        tokio_test::assert_ok!(bridge.start().await);
        assert_eq!(bridge.context().settings().await, RemoteSettings::default());
        assert_eq!(bridge.agent_manager.agent_count().await, 2);

        tokio_test::assert_ok!(bridge.stop().await);
        tokio_test::assert_ok!(bridge.stop().await);
    }

    #[tokio::test]
    async fn test_recent_assets_and_sort() {
        let bridge = bridge(MockBackend::new(), ManualClock::default()).await;

        for id in ["a", "b", "a"] {
            bridge
                .record_asset(RecentAsset {
                    id: id.to_string(),
                    url: format!("https://cdn.suno.ai/{}.mp3", id),
                    kind: AssetKind::Audio,
                    used_at: DateTime::<Utc>::default(),
                })
                .await
                .unwrap();
        }
        let ids: Vec<_> = bridge.recent_assets().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        bridge.set_sort_preference(SortPreference::Name).await.unwrap();
        assert_eq!(bridge.switcher().sort_preference().await.unwrap(), SortPreference::Name);
    }

    #[tokio::test]
    async fn test_stop_before_start_keeps_watchers_running() {
        let mut backend = MockBackend::new();
        backend
            .expect_get_settings()
            .returning(|| Ok(RemoteSettings::default()));
        let bridge = bridge(backend, ManualClock::default()).await;

        tokio_test::assert_ok!(bridge.stop().await);
        tokio_test::assert_ok!(bridge.start().await);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let status = bridge.agent_manager.status().await;
        assert_eq!(status.get("navigation"), Some(&agents::AgentStatus::Running));
        assert_eq!(status.get("session"), Some(&agents::AgentStatus::Running));

        tokio_test::assert_ok!(bridge.stop().await);
        let status = bridge.agent_manager.status().await;
        assert_eq!(status.get("session"), Some(&agents::AgentStatus::Stopped));
    }

    #[tokio::test]
    async fn test_from_config_requires_backend_url() {
        let result = SessionBridge::from_config(
            BridgeConfig::default(),
            Arc::new(MockCookieSource::new()),
            Arc::new(MemoryStorage::new()),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_from_config_talks_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/extension/messages"))
            .and(body_json(json!({"action": "getSettings"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"autoImport": false, "showAccountSwitcher": false}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = BridgeConfig {
            backend_url: Some(server.uri()),
            ..BridgeConfig::default()
        };
        let bridge = SessionBridge::from_config(
            config,
            Arc::new(MockCookieSource::new()),
            Arc::new(MemoryStorage::new()),
        )
        .await
        .unwrap();

        let settings = bridge.refresh_settings().await;
        assert!(!settings.auto_import);
        assert!(!settings.show_account_switcher);
    }

    #[tokio::test]
    async fn test_switcher_hidden_by_settings() {
        let mut backend = MockBackend::new();
        backend
            .expect_detect_provider()
            .returning(|_| Ok(Some(ProviderId::from("suno"))));
        let bridge = bridge(backend, ManualClock::default()).await;
        let suno = ProviderId::from("suno");

        assert_eq!(bridge.switcher_accounts().await.unwrap(), None);

        bridge.observe_url("https://suno.com/create", NavigationSource::Initial).await;
        bridge
            .handle_backend_event(BackendEvent::AccountsUpdated {
                accounts: vec![AccountSummary {
                    id: "s-1".to_string(),
                    provider: suno.clone(),
                    label: "Studio".to_string(),
                    email: None,
                    credits: None,
                    last_used_at: None,
                }],
            })
            .await;

        let shown = bridge.switcher_accounts().await.unwrap();
        assert_eq!(shown.map(|a| a.len()), Some(1));

        bridge
            .context()
            .set_settings(RemoteSettings {
                show_account_switcher: false,
                ..RemoteSettings::default()
            })
            .await;
        assert_eq!(bridge.switcher_accounts().await.unwrap(), None);
    }
}
