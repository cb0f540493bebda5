//! Navigation watcher - Classifies each page the user lands on
//!
//! The host reports navigations (initial load, history changes, DOM mutations
//! that swap the URL) as [`NavigationEvent`]s. Every distinct URL is
//! classified once and the result is stored in the [`SessionContext`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::base::{Agent, AgentError, AgentStatus};
use crate::bridge::Backend;
use crate::context::SessionContext;
use crate::providers::{ProviderId, ProviderRegistry};
use crate::security::Sanitizer;

const CHANNEL_CAPACITY: usize = 64;

/// What caused a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    Initial,
    /// The URL changed without a history call (SPA routers)
    Mutation,
    PopState,
    PushState,
    ReplaceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub url: String,
    pub source: NavigationSource,
}

impl NavigationEvent {
    pub fn new(url: impl Into<String>, source: NavigationSource) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }
}

/// Callback type for completed detections
pub type DetectionCallback = Box<dyn Fn(&str, Option<&ProviderId>) + Send + Sync>;

/// Agent that keeps the context's provider in step with the page URL
pub struct NavigationWatcher {
    context: Arc<SessionContext>,
    backend: Arc<dyn Backend>,
    registry: Arc<ProviderRegistry>,
    sender: mpsc::Sender<NavigationEvent>,
    receiver: Mutex<mpsc::Receiver<NavigationEvent>>,
    status: RwLock<AgentStatus>,
    cancel_token: RwLock<CancellationToken>,
    on_detect: RwLock<Option<DetectionCallback>>,
}

impl NavigationWatcher {
    pub fn new(
        context: Arc<SessionContext>,
        backend: Arc<dyn Backend>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            context,
            backend,
            registry,
            sender,
            receiver: Mutex::new(receiver),
            status: RwLock::new(AgentStatus::Idle),
            cancel_token: RwLock::new(CancellationToken::new()),
            on_detect: RwLock::new(None),
        }
    }

    /// Handle for the host to report navigations while the agent runs
    pub fn sender(&self) -> mpsc::Sender<NavigationEvent> {
        self.sender.clone()
    }

    /// Sets a callback to be called when a detection result is stored
    pub async fn on_detect<F>(&self, callback: F)
    where
        F: Fn(&str, Option<&ProviderId>) + Send + Sync + 'static,
    {
        *self.on_detect.write().await = Some(Box::new(callback));
    }

    /// Handles one navigation
    ///
    /// Returns the provider stored for the URL, or `None` when there is none,
    /// the URL cannot be parsed, or the user moved on before detection
    /// finished.
    pub async fn observe(&self, url: &str, source: NavigationSource) -> Option<ProviderId> {
        let Some(url) = normalize(url) else {
            tracing::debug!("Ignoring unparsable URL from {:?}", source);
            return None;
        };

        if !self.context.begin_navigation(&url).await {
            return self.context.provider().await;
        }

        tracing::debug!(
            "Navigation ({:?}) to {}",
            source,
            Sanitizer::sanitize_url(&url)
        );
        self.detect(&url).await
    }

    /// Classifies the current URL again
    pub async fn redetect(&self) -> Option<ProviderId> {
        let url = self.context.current_url().await?;
        self.detect(&url).await
    }

    async fn detect(&self, url: &str) -> Option<ProviderId> {
        let provider = match self.backend.detect_provider(url).await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Provider detection failed, matching locally: {}", e);
                self.registry.detect(url)
            }
        };

        if !self.context.complete_detection(url, provider.clone()).await {
            return None;
        }

        match &provider {
            Some(id) => tracing::info!("Detected provider {} on {}", id, Sanitizer::sanitize_url(url)),
            None => tracing::debug!("No provider on {}", Sanitizer::sanitize_url(url)),
        }

        if let Some(ref callback) = *self.on_detect.read().await {
            callback(url, provider.as_ref());
        }

        provider
    }

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

/// Canonical form of a page URL, so `HTTPS://Claude.ai` and
/// `https://claude.ai/` count as the same page
fn normalize(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok().map(String::from)
}

#[async_trait]
impl Agent for NavigationWatcher {
    fn id(&self) -> &'static str {
        "navigation"
    }

    fn name(&self) -> &'static str {
        "Navigation Watcher"
    }

    fn status(&self) -> AgentStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(AgentStatus::Idle)
    }

    async fn start(&self) -> Result<(), AgentError> {
        let mut receiver = self
            .receiver
            .try_lock()
            .map_err(|_| AgentError::AlreadyRunning)?;
        let token = self.begin_run().await?;

        // The watcher holds a sender itself, so the channel never closes
        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    self.observe(&event.url, event.source).await;
                }
                _ = token.cancelled() => {
                    tracing::info!("Navigation watcher stopped");
                    break;
                }
            }
        }

        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        let status = self.status.read().await;
        if status.is_running() {
            self.cancel_token.read().await.cancel();
        }
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.redetect().await;
        Ok(())
    }
}
