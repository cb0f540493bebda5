//! Recently used assets and the account switcher sort preference

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{load, save, Storage, StorageError, RECENT_ASSETS_KEY, SORT_PREFERENCE_KEY};

/// Kind of generated or uploaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Other,
}

/// An asset the user picked recently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAsset {
    pub id: String,
    pub url: String,
    pub kind: AssetKind,
    pub used_at: DateTime<Utc>,
}

/// Deduplicated, newest-first, capped list under `recentAssets`
#[derive(Clone)]
pub struct RecentAssets {
    storage: Arc<dyn Storage>,
    limit: usize,
}

impl RecentAssets {
    pub fn new(storage: Arc<dyn Storage>, limit: usize) -> Self {
        Self { storage, limit }
    }

    pub async fn list(&self) -> Result<Vec<RecentAsset>, StorageError> {
        Ok(load(self.storage.as_ref(), RECENT_ASSETS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Moves the asset to the front, dropping the oldest beyond the limit
    pub async fn record(&self, asset: RecentAsset) -> Result<(), StorageError> {
        let mut assets = self.list().await?;
        assets.retain(|a| a.id != asset.id);
        assets.insert(0, asset);
        assets.truncate(self.limit);
        save(self.storage.as_ref(), RECENT_ASSETS_KEY, &assets).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(RECENT_ASSETS_KEY).await
    }
}

/// Sort order of the account switcher list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPreference {
    #[default]
    Recent,
    Name,
    Credits,
}

/// Typed access to `assetSortPreference`
#[derive(Clone)]
pub struct SortPreferenceStore {
    storage: Arc<dyn Storage>,
}

impl SortPreferenceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self) -> Result<SortPreference, StorageError> {
        Ok(load(self.storage.as_ref(), SORT_PREFERENCE_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set(&self, preference: SortPreference) -> Result<(), StorageError> {
        save(self.storage.as_ref(), SORT_PREFERENCE_KEY, &preference).await
    }
}
