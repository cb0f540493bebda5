//! Provider module - Session profiles for the supported sites
//!
//! The backend decides which provider a URL belongs to; the registry supplies
//! the local rules (auth predicate, fingerprint, identifiers) for each id, and
//! a domain match used when the backend cannot be reached.

mod base;
mod claude;
mod gemini;
mod openai;
mod suno;

pub use base::*;
pub use claude::ClaudeProfile;
pub use gemini::GeminiProfile;
pub use openai::OpenAIProfile;
pub use suno::SunoProfile;

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

/// Registry of known provider profiles
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn ProviderProfile>>,
}

impl ProviderRegistry {
    /// Creates a registry with the built-in profiles
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ClaudeProfile::new()));
        registry.register(Arc::new(OpenAIProfile::new()));
        registry.register(Arc::new(GeminiProfile::new()));
        registry.register(Arc::new(SunoProfile::new()));
        registry
    }

    /// Creates a registry with no profiles
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Adds or replaces a profile
    pub fn register(&mut self, profile: Arc<dyn ProviderProfile>) {
        self.providers.insert(profile.id(), profile);
    }

    /// Gets a profile by ID
    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn ProviderProfile>> {
        self.providers.get(id.as_str()).cloned()
    }

    /// Gets all provider IDs
    pub fn provider_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.providers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Matches a page URL against the registered domains
    pub fn detect(&self, url: &str) -> Option<ProviderId> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?;
        self.providers
            .values()
            .find(|p| p.matches_host(host))
            .map(|p| ProviderId::from(p.id()))
    }

    /// Gets provider metadata for all providers
    pub fn metadata(&self) -> Vec<ProviderMetadata> {
        let mut meta: Vec<_> = self
            .providers
            .values()
            .map(|p| ProviderMetadata::of(p.as_ref()))
            .collect();
        meta.sort_by(|a, b| a.id.cmp(&b.id));
        meta
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
