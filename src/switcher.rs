//! Account switcher data
//!
//! Holds the account list the backend pushes with `accountsUpdated` and
//! presents it the way the in-page switcher shows it: filtered to the current
//! provider, sorted by the persisted preference, with the active account
//! marked.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bridge::{AccountSummary, BackendEvent};
use crate::providers::ProviderId;
use crate::storage::{RememberedAccounts, SortPreference, SortPreferenceStore, Storage, StorageError};

/// Sorts accounts in place
///
/// `Recent` puts the most recently used first, `Credits` the richest first;
/// accounts missing the sort field go last. Ties fall back to the label.
pub fn sort_accounts(accounts: &mut [AccountSummary], preference: SortPreference) {
    let by_label = |a: &AccountSummary, b: &AccountSummary| {
        a.label.to_lowercase().cmp(&b.label.to_lowercase())
    };

    accounts.sort_by(|a, b| {
        let primary = match preference {
            SortPreference::Recent => b.last_used_at.cmp(&a.last_used_at),
            SortPreference::Name => Ordering::Equal,
            SortPreference::Credits => credits_key(b).total_cmp(&credits_key(a)),
        };
        primary.then_with(|| by_label(a, b))
    });
}

fn credits_key(account: &AccountSummary) -> f64 {
    account.credits.unwrap_or(f64::NEG_INFINITY)
}

pub struct AccountSwitcher {
    accounts: RwLock<Vec<AccountSummary>>,
    sort: SortPreferenceStore,
    remembered: RememberedAccounts,
}

impl AccountSwitcher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            sort: SortPreferenceStore::new(storage.clone()),
            remembered: RememberedAccounts::new(storage),
        }
    }

    /// Applies a pushed backend event
    pub async fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::AccountsUpdated { accounts } => {
                tracing::debug!("Account list updated ({} accounts)", accounts.len());
                *self.accounts.write().await = accounts;
            }
        }
    }

    pub async fn sort_preference(&self) -> Result<SortPreference, StorageError> {
        self.sort.get().await
    }

    pub async fn set_sort_preference(&self, preference: SortPreference) -> Result<(), StorageError> {
        self.sort.set(preference).await
    }

    /// Every known account, sorted by the stored preference
    pub async fn accounts(&self) -> Result<Vec<AccountSummary>, StorageError> {
        let preference = self.sort.get().await?;
        let mut accounts = self.accounts.read().await.clone();
        sort_accounts(&mut accounts, preference);
        Ok(accounts)
    }

    /// Accounts of one provider, sorted by the stored preference
    pub async fn accounts_for(&self, provider: &ProviderId) -> Result<Vec<AccountSummary>, StorageError> {
        let mut accounts = self.accounts().await?;
        accounts.retain(|a| &a.provider == provider);
        Ok(accounts)
    }

    /// The listed account the provider's current session was imported into
    pub async fn active_account(&self, provider: &ProviderId) -> Result<Option<AccountSummary>, StorageError> {
        let Some(remembered) = self.remembered.get(provider).await? else {
            return Ok(None);
        };

        let accounts = self.accounts.read().await;
        Ok(accounts
            .iter()
            .find(|a| a.id == remembered.account_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, RememberedAccount};
    use chrono::{DateTime, Duration, Utc};

    fn summary(id: &str, provider: &str, label: &str, credits: Option<f64>, used_min: Option<i64>) -> AccountSummary {
        AccountSummary {
            id: id.to_string(),
            provider: ProviderId::from(provider),
            label: label.to_string(),
            email: None,
            credits,
            last_used_at: used_min.map(|m| DateTime::<Utc>::default() + Duration::minutes(m)),
        }
    }

    fn sample() -> Vec<AccountSummary> {
        vec![
            summary("a1", "suno", "work", Some(50.0), Some(5)),
            summary("a2", "suno", "Alt", None, Some(30)),
            summary("a3", "suno", "Main", Some(500.0), None),
            summary("c1", "claude", "Team", Some(10.0), Some(1)),
        ]
    }

    fn ids(accounts: &[AccountSummary]) -> Vec<&str> {
        accounts.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_sort_orders() {
        let mut accounts = sample();

        sort_accounts(&mut accounts, SortPreference::Recent);
        assert_eq!(ids(&accounts), vec!["a2", "a1", "c1", "a3"]);

        sort_accounts(&mut accounts, SortPreference::Name);
        assert_eq!(ids(&accounts), vec!["a2", "a3", "c1", "a1"]);

        sort_accounts(&mut accounts, SortPreference::Credits);
        assert_eq!(ids(&accounts), vec!["a3", "a1", "c1", "a2"]);
    }

    #[tokio::test]
    async fn test_accounts_follow_preference() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let switcher = AccountSwitcher::new(storage);
        switcher
            .handle_event(BackendEvent::AccountsUpdated { accounts: sample() })
            .await;

        let suno = ProviderId::from("suno");
        assert_eq!(ids(&switcher.accounts_for(&suno).await.unwrap()), vec!["a2", "a1", "a3"]);

        switcher.set_sort_preference(SortPreference::Credits).await.unwrap();
        assert_eq!(switcher.sort_preference().await.unwrap(), SortPreference::Credits);
        assert_eq!(ids(&switcher.accounts_for(&suno).await.unwrap()), vec!["a3", "a1", "a2"]);
    }

    #[tokio::test]
    async fn test_active_account_from_remembered() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let switcher = AccountSwitcher::new(storage.clone());
        switcher
            .handle_event(BackendEvent::AccountsUpdated { accounts: sample() })
            .await;

        let suno = ProviderId::from("suno");
        assert_eq!(switcher.active_account(&suno).await.unwrap(), None);

        RememberedAccounts::new(storage)
            .remember(RememberedAccount {
                account_id: "a3".to_string(),
                provider: suno.clone(),
                email: None,
                display_name: None,
                imported_at: DateTime::<Utc>::default(),
            })
            .await
            .unwrap();

        let active = switcher.active_account(&suno).await.unwrap();
        assert_eq!(active.map(|a| a.label), Some("Main".to_string()));
    }
}
