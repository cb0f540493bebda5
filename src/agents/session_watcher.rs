//! Session watcher - Follows the login session of the current provider
//!
//! Polls the provider's cookies on a fixed interval, feeds each reading to a
//! [`SessionMachine`] and performs the side effects of its transitions:
//! importing the session into the backend and releasing the account on
//! logout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::base::{Agent, AgentError, AgentStatus};
use super::session_state::{ImportLimiter, SessionMachine, SessionPhase, SessionTiming, Transition};
use crate::auth::{CookieJar, CookieSource, ImportPayload};
use crate::bridge::{AccountStatus, Backend};
use crate::clock::Clock;
use crate::config::BridgeConfig;
use crate::context::SessionContext;
use crate::providers::{ProviderId, ProviderProfile, ProviderRegistry};
use crate::security::Sanitizer;
use crate::storage::{RememberedAccount, RememberedAccounts};

/// Callback type for session transitions
pub type TransitionCallback = Box<dyn Fn(&ProviderId, &Transition) + Send + Sync>;

/// Machine plus the provider it is tracking
///
/// `limiter` outlives provider switches, so bouncing between providers does
/// not lift the import rate limit.
struct Tracked {
    provider: Option<ProviderId>,
    machine: SessionMachine,
    limiter: ImportLimiter,
}

/// Agent that watches the current provider's login session
pub struct SessionWatcher {
    context: Arc<SessionContext>,
    backend: Arc<dyn Backend>,
    cookies: Arc<dyn CookieSource>,
    registry: Arc<ProviderRegistry>,
    accounts: RememberedAccounts,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    tracked: Mutex<Tracked>,
    status: RwLock<AgentStatus>,
    cancel_token: RwLock<CancellationToken>,
    on_transition: RwLock<Option<TransitionCallback>>,
}

impl SessionWatcher {
    pub fn new(
        context: Arc<SessionContext>,
        backend: Arc<dyn Backend>,
        cookies: Arc<dyn CookieSource>,
        registry: Arc<ProviderRegistry>,
        accounts: RememberedAccounts,
        clock: Arc<dyn Clock>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            context,
            backend,
            cookies,
            registry,
            accounts,
            clock,
            poll_interval: config.poll_interval(),
            tracked: Mutex::new(Tracked {
                provider: None,
                machine: SessionMachine::new(SessionTiming::from(config)),
                limiter: ImportLimiter::new(),
            }),
            status: RwLock::new(AgentStatus::Idle),
            cancel_token: RwLock::new(CancellationToken::new()),
            on_transition: RwLock::new(None),
        }
    }

    /// Sets a callback to be called for every session transition
    pub async fn on_transition<F>(&self, callback: F)
    where
        F: Fn(&ProviderId, &Transition) + Send + Sync + 'static,
    {
        *self.on_transition.write().await = Some(Box::new(callback));
    }

    /// Phase of the tracked session, with the provider it belongs to
    pub async fn phase(&self) -> (Option<ProviderId>, SessionPhase) {
        let tracked = self.tracked.lock().await;
        (tracked.provider.clone(), tracked.machine.phase())
    }

    /// Takes one cookie reading and handles the resulting transitions
    ///
    /// Every failure is logged and swallowed; the next tick simply tries
    /// again.
    pub async fn poll_once(&self) -> Vec<Transition> {
        let (url, provider) = self.context.snapshot().await;
        let (Some(url), Some(provider)) = (url, provider) else {
            return Vec::new();
        };

        let Some(profile) = self.registry.get(&provider) else {
            tracing::debug!("No session rules for provider {}", provider);
            return Vec::new();
        };

        let mut tracked = self.tracked.lock().await;
        if tracked.provider.as_ref() != Some(&provider) {
            tracing::debug!("Monitoring {} session", provider);
            tracked.provider = Some(provider.clone());
            tracked.machine.reset();
        }

        let jar = match self.cookies.cookies(&url).await {
            Ok(jar) => jar,
            Err(e) => {
                tracing::warn!(
                    "Failed to read cookies for {}: {}",
                    Sanitizer::sanitize_url(&url),
                    e
                );
                return Vec::new();
            }
        };

        let now = self.clock.now();
        let authenticated = profile.is_authenticated(&jar);
        let fingerprint = authenticated.then(|| profile.fingerprint(&jar));
        tracing::debug!(
            provider = %provider,
            authenticated,
            cookies = %Sanitizer::describe_cookies(&jar),
            "Session tick"
        );

        let Tracked { machine, limiter, .. } = &mut *tracked;
        let transitions = machine.observe(now, authenticated, fingerprint, limiter.slot(&provider));
        drop(tracked);

        for transition in &transitions {
            self.apply(profile.as_ref(), &provider, &url, &jar, transition, now)
                .await;

            if let Some(ref callback) = *self.on_transition.read().await {
                callback(&provider, transition);
            }
        }

        transitions
    }

    async fn apply(
        &self,
        profile: &dyn ProviderProfile,
        provider: &ProviderId,
        url: &str,
        jar: &CookieJar,
        transition: &Transition,
        now: DateTime<Utc>,
    ) {
        match transition {
            Transition::LoggedIn => tracing::info!("{} session signed in", profile.name()),
            Transition::LogoutPending { since } => {
                tracing::debug!("{} session looks signed out since {}", provider, since)
            }
            Transition::LogoutCancelled => {
                tracing::debug!("{} session came back before logout", provider)
            }
            Transition::LoggedOut => {
                tracing::info!("{} session signed out", profile.name());
                self.release_account(provider).await;
            }
            Transition::CookiesChanged { fingerprint } => {
                tracing::debug!("{} cookies changed ({})", provider, fingerprint.short())
            }
            Transition::ImportScheduled { due } => {
                tracing::debug!("{} import scheduled for {}", provider, due)
            }
            Transition::ImportDue => self.import_session(profile, provider, url, jar, now).await,
        }
    }

    async fn import_session(
        &self,
        profile: &dyn ProviderProfile,
        provider: &ProviderId,
        url: &str,
        jar: &CookieJar,
        now: DateTime<Utc>,
    ) {
        let settings = self.context.settings().await;
        if !settings.should_import(provider.as_str()) {
            tracing::info!("Import disabled for {}, skipping", provider);
            return;
        }

        let identifiers = profile.session_identifiers(jar);
        let missing: Vec<&str> = profile
            .required_identifiers()
            .iter()
            .copied()
            .filter(|key| !identifiers.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "Importing {} session without {}",
                provider,
                missing.join(", ")
            );
        }

        let bearer_token = if profile.uses_bearer_token() {
            let token = self.context.bearer_token(provider).await;
            if token.is_none() {
                tracing::warn!("Importing {} session without a bearer token", provider);
            }
            token
        } else {
            None
        };

        let payload = ImportPayload::new(jar.clone(), now)
            .with_identifiers(identifiers)
            .with_bearer_token(bearer_token);

        let raw = match payload.to_value() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to encode {} import payload: {}", provider, e);
                return;
            }
        };

        let outcome = match self.backend.import_cookies(provider, url, raw).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Failed to import {} session: {}", provider, e);
                return;
            }
        };

        let Some(account) = outcome.account else {
            tracing::debug!("Backend kept no account for the {} import", provider);
            return;
        };

        tracing::info!(
            "Imported {} session into account {} ({})",
            provider,
            account.id,
            if outcome.created { "new" } else { "existing" }
        );

        let remembered = RememberedAccount {
            account_id: account.id.clone(),
            provider: provider.clone(),
            email: account.email,
            display_name: account.display_name,
            imported_at: now,
        };
        if let Err(e) = self.accounts.remember(remembered).await {
            tracing::warn!("Failed to remember account {}: {}", account.id, e);
        }

        if let Err(e) = self
            .backend
            .update_account_status(&account.id, AccountStatus::Active)
            .await
        {
            tracing::warn!("Failed to mark account {} active: {}", account.id, e);
        }

        match self.backend.sync_account_credits(&account.id).await {
            Ok(credits) => tracing::debug!(
                "Account {} has {} credits",
                credits.account_id,
                credits.credits
            ),
            Err(e) => tracing::warn!("Failed to sync credits for {}: {}", account.id, e),
        }
    }

    async fn release_account(&self, provider: &ProviderId) {
        self.context.clear_credentials(provider).await;

        let account = match self.accounts.forget(provider).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::debug!("No remembered {} account to release", provider);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to clear remembered {} account: {}", provider, e);
                return;
            }
        };

        if let Err(e) = self
            .backend
            .update_account_status(&account.account_id, AccountStatus::LoggedOut)
            .await
        {
            tracing::warn!(
                "Failed to report logout of account {}: {}",
                account.account_id,
                e
            );
        }
    }

    /// Marks the watcher running and hands out a live token for this run
    async fn begin_run(&self) -> Result<CancellationToken, AgentError> {
        let mut status = self.status.write().await;
        if status.is_running() {
            return Err(AgentError::AlreadyRunning);
        }

        let mut token = self.cancel_token.write().await;
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        *status = AgentStatus::Running;
        Ok(token.clone())
    }
}

#[async_trait]
impl Agent for SessionWatcher {
    fn id(&self) -> &'static str {
        "session"
    }

    fn name(&self) -> &'static str {
        "Session Watcher"
    }

    fn status(&self) -> AgentStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(AgentStatus::Idle)
    }

    async fn start(&self) -> Result<(), AgentError> {
        let token = self.begin_run().await?;

        loop {
            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = token.cancelled() => {
                    tracing::info!("Session watcher stopped");
                    break;
                }
            }
        }

        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    /// Ends the current run; does nothing while no run is active
    async fn stop(&self) -> Result<(), AgentError> {
        let status = self.status.read().await;
        if status.is_running() {
            self.cancel_token.read().await.cancel();
        }
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.poll_once().await;
        Ok(())
    }
}
