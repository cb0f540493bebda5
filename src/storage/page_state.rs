//! Page state saved across login-triggered reloads
//!
//! Signing in to a provider reloads the page and wipes what the user had
//! typed or uploaded. The host captures the prompt and images right before
//! the reload and asks for them back once the page is up again.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{load, save, Storage, StorageError, PENDING_PAGE_STATE_KEY};
use crate::providers::ProviderId;

/// An uploaded image, carried inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedImage {
    pub file_name: String,
    pub mime_type: String,
    /// Base64 (standard alphabet) file contents
    pub data: String,
}

impl CapturedImage {
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }

    /// `data:` URL the page can feed straight back into a file input
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Transient UI state of a provider page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub images: Vec<CapturedImage>,
    pub saved_at: DateTime<Utc>,
}

impl PageState {
    pub fn new(url: impl Into<String>, saved_at: DateTime<Utc>) -> Self {
        Self {
            provider: None,
            url: url.into(),
            prompt: None,
            images: Vec::new(),
            saved_at,
        }
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_image(mut self, image: CapturedImage) -> Self {
        self.images.push(image);
        self
    }

    /// Nothing worth restoring
    pub fn is_empty(&self) -> bool {
        self.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) && self.images.is_empty()
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// One-shot slot for the `pendingPageState` blob
#[derive(Clone)]
pub struct PageStateStore {
    storage: Arc<dyn Storage>,
    max_age: Duration,
}

impl PageStateStore {
    pub fn new(storage: Arc<dyn Storage>, max_age: Duration) -> Self {
        Self { storage, max_age }
    }

    /// Saves the state, replacing any earlier one
    ///
    /// Returns false when there was nothing to save.
    pub async fn save(&self, state: &PageState) -> Result<bool, StorageError> {
        if state.is_empty() {
            self.storage.remove(PENDING_PAGE_STATE_KEY).await?;
            return Ok(false);
        }
        save(self.storage.as_ref(), PENDING_PAGE_STATE_KEY, state).await?;
        Ok(true)
    }

    /// Takes the saved state back for the page at `url`
    ///
    /// A state saved on a different host is left in place, since the login
    /// flow may pass through other hosts before returning. An expired state
    /// is discarded.
    pub async fn restore(
        &self,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PageState>, StorageError> {
        let state: PageState = match load(self.storage.as_ref(), PENDING_PAGE_STATE_KEY).await {
            Ok(Some(state)) => state,
            Ok(None) => return Ok(None),
            Err(StorageError::Serde(e)) => {
                tracing::warn!("Dropping unreadable page state: {}", e);
                self.storage.remove(PENDING_PAGE_STATE_KEY).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if now - state.saved_at > self.max_age {
            tracing::debug!("Discarding page state saved at {}", state.saved_at);
            self.storage.remove(PENDING_PAGE_STATE_KEY).await?;
            return Ok(None);
        }

        if host_of(&state.url).is_none() || host_of(&state.url) != host_of(url) {
            return Ok(None);
        }

        self.storage.remove(PENDING_PAGE_STATE_KEY).await?;
        Ok(Some(state))
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(PENDING_PAGE_STATE_KEY).await
    }
}
