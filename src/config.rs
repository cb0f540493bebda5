//! Configuration management
//!
//! Local timing and storage settings live in a JSON file under the platform
//! config dir. Remote, per-user settings come from the backend's
//! `getSettings` and are kept in [`RemoteSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    PathUnavailable,

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Local configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Cookie poll interval
    pub poll_interval_ms: u64,
    /// How long the session must read as signed out before logout is confirmed
    pub logout_debounce_ms: u64,
    /// Delay between a detected cookie change and the import
    pub import_delay_ms: u64,
    /// Minimum spacing between two imports
    pub min_import_interval_ms: u64,
    /// Saved page state older than this is discarded on restore
    pub page_state_max_age_secs: u64,
    /// Length of the recently used asset list
    pub recent_assets_limit: usize,
    /// Base URL of the account backend, when talking to it over HTTP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            logout_debounce_ms: 5_000,
            import_delay_ms: 1_500,
            min_import_interval_ms: 10_000,
            page_state_max_age_secs: 300,
            recent_assets_limit: 20,
            backend_url: None,
        }
    }
}

/// Upper bound for every configured interval; larger values are clamped
pub const MAX_INTERVAL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

fn clamped_millis(ms: u64) -> chrono::Duration {
    // Fits in i64 after clamping
    chrono::Duration::milliseconds(ms.min(MAX_INTERVAL_MS) as i64)
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(MAX_INTERVAL_MS))
    }

    pub fn logout_debounce(&self) -> chrono::Duration {
        clamped_millis(self.logout_debounce_ms)
    }

    pub fn import_delay(&self) -> chrono::Duration {
        clamped_millis(self.import_delay_ms)
    }

    pub fn min_import_interval(&self) -> chrono::Duration {
        clamped_millis(self.min_import_interval_ms)
    }

    pub fn page_state_max_age(&self) -> chrono::Duration {
        clamped_millis(self.page_state_max_age_secs.saturating_mul(1000))
    }

    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("SessionBridge"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/SessionBridge"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("sessionbridge"))
        }
    }

    /// Gets the default config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Loads configuration from the default path, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Using default config ({}): {}", path.display(), e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Loads configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::PathUnavailable)?;
        self.save_to(&path)
    }

    /// Saves configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Per-user settings served by the backend's `getSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteSettings {
    /// Import sessions automatically when a login is seen
    pub auto_import: bool,
    /// Provider allow-list; `None` means every provider
    pub enabled_providers: Option<Vec<String>>,
    /// Whether the in-page account switcher is shown
    pub show_account_switcher: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            auto_import: true,
            enabled_providers: None,
            show_account_switcher: true,
        }
    }
}

impl RemoteSettings {
    /// Check if a provider is enabled
    pub fn is_provider_enabled(&self, provider_id: &str) -> bool {
        self.enabled_providers
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == provider_id))
    }

    /// Whether sessions for the provider should be imported
    pub fn should_import(&self, provider_id: &str) -> bool {
        self.auto_import && self.is_provider_enabled(provider_id)
    }
}
