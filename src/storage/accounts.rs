//! The remembered account per provider
//!
//! Created when an import succeeds, cleared when a logout is confirmed.
//! There is never more than one entry per provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{load, save, Storage, StorageError, REMEMBERED_ACCOUNTS_KEY};
use crate::providers::ProviderId;

/// Backend account the current provider session was imported into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RememberedAccount {
    pub account_id: String,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub imported_at: DateTime<Utc>,
}

type AccountMap = BTreeMap<ProviderId, RememberedAccount>;

/// Typed access to the `rememberedAccounts` key
#[derive(Clone)]
pub struct RememberedAccounts {
    storage: Arc<dyn Storage>,
}

impl RememberedAccounts {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn load_map(&self) -> Result<AccountMap, StorageError> {
        Ok(load(self.storage.as_ref(), REMEMBERED_ACCOUNTS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn get(&self, provider: &ProviderId) -> Result<Option<RememberedAccount>, StorageError> {
        Ok(self.load_map().await?.remove(provider))
    }

    pub async fn all(&self) -> Result<Vec<RememberedAccount>, StorageError> {
        Ok(self.load_map().await?.into_values().collect())
    }

    /// Stores the account for its provider, replacing any previous one
    pub async fn remember(&self, account: RememberedAccount) -> Result<(), StorageError> {
        let mut map = self.load_map().await?;
        map.insert(account.provider.clone(), account);
        save(self.storage.as_ref(), REMEMBERED_ACCOUNTS_KEY, &map).await
    }

    /// Clears and returns the account for a provider
    pub async fn forget(&self, provider: &ProviderId) -> Result<Option<RememberedAccount>, StorageError> {
        let mut map = self.load_map().await?;
        let removed = map.remove(provider);
        if removed.is_some() {
            save(self.storage.as_ref(), REMEMBERED_ACCOUNTS_KEY, &map).await?;
        }
        Ok(removed)
    }
}
