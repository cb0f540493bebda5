//! Bridge to the account backend
//!
//! Everything the watchers need from the outside world goes through the
//! [`Backend`] trait: provider detection, user settings, session import and
//! account bookkeeping. Requests are JSON messages tagged by `action`, the
//! same shape the extension background script exchanges, so any
//! [`Transport`] that can carry a message round trip can back it.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::RemoteSettings;
use crate::providers::ProviderId;

/// Errors that can occur talking to the backend
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status
    #[error("Backend returned HTTP {0}")]
    Status(u16),

    /// The backend handled the message and refused it
    #[error("Backend rejected {action}: {message}")]
    Rejected { action: &'static str, message: String },

    /// The response did not have the expected shape
    #[error("Invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No transport is configured
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// A message to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackendRequest {
    DetectProvider {
        url: String,
    },
    GetSettings,
    #[serde(rename_all = "camelCase")]
    ImportCookies {
        provider_id: ProviderId,
        url: String,
        raw_data: Value,
    },
    #[serde(rename_all = "camelCase")]
    UpdateAccountStatus {
        account_id: String,
        status: AccountStatus,
    },
    #[serde(rename_all = "camelCase")]
    SyncAccountCredits {
        account_id: String,
    },
}

impl BackendRequest {
    /// Wire name of the action, for logs and errors
    pub fn action(&self) -> &'static str {
        match self {
            Self::DetectProvider { .. } => "detectProvider",
            Self::GetSettings => "getSettings",
            Self::ImportCookies { .. } => "importCookies",
            Self::UpdateAccountStatus { .. } => "updateAccountStatus",
            Self::SyncAccountCredits { .. } => "syncAccountCredits",
        }
    }
}

/// Response envelope shared by every action
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Status reported for a remembered account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    LoggedOut,
}

/// Account the backend stored an imported session under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedAccount {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Result of `importCookies`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOutcome {
    pub account: Option<ImportedAccount>,
    /// True when the import created a new account rather than refreshing one
    pub created: bool,
}

/// Result of `syncAccountCredits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredits {
    pub account_id: String,
    pub credits: f64,
}

/// Account row pushed with `accountsUpdated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub provider: ProviderId,
    pub label: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credits: Option<f64>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Messages the backend pushes without being asked
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackendEvent {
    AccountsUpdated { accounts: Vec<AccountSummary> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Detection {
    #[serde(default)]
    provider_id: Option<ProviderId>,
}

/// Operations the watchers need from the account backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which provider, if any, serves this URL
    async fn detect_provider(&self, url: &str) -> Result<Option<ProviderId>, BridgeError>;

    async fn get_settings(&self) -> Result<RemoteSettings, BridgeError>;

    /// Hands a captured session to the backend
    async fn import_cookies(
        &self,
        provider: &ProviderId,
        url: &str,
        raw_data: Value,
    ) -> Result<ImportOutcome, BridgeError>;

    async fn update_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
    ) -> Result<(), BridgeError>;

    async fn sync_account_credits(&self, account_id: &str) -> Result<AccountCredits, BridgeError>;
}

/// A request/response channel to the backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message and returns the raw response body
    async fn send(&self, request: &BackendRequest) -> Result<Value, BridgeError>;
}

/// [`Backend`] over any message [`Transport`]
pub struct MessageBackend<T> {
    transport: T,
}

impl<T: Transport> MessageBackend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn call<R: DeserializeOwned>(&self, request: BackendRequest) -> Result<R, BridgeError> {
        let action = request.action();
        let body = self.transport.send(&request).await?;
        let envelope: Envelope = serde_json::from_value(body)?;

        if !envelope.success {
            return Err(BridgeError::Rejected {
                action,
                message: envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(serde_json::from_value(envelope.data)?)
    }
}

/// Backend reached over HTTP
pub type HttpBackend = MessageBackend<HttpTransport>;

#[async_trait]
impl<T: Transport> Backend for MessageBackend<T> {
    async fn detect_provider(&self, url: &str) -> Result<Option<ProviderId>, BridgeError> {
        let detection: Option<Detection> = self
            .call(BackendRequest::DetectProvider {
                url: url.to_string(),
            })
            .await?;
        Ok(detection.and_then(|d| d.provider_id))
    }

    async fn get_settings(&self) -> Result<RemoteSettings, BridgeError> {
        let settings: Option<RemoteSettings> = self.call(BackendRequest::GetSettings).await?;
        Ok(settings.unwrap_or_default())
    }

    async fn import_cookies(
        &self,
        provider: &ProviderId,
        url: &str,
        raw_data: Value,
    ) -> Result<ImportOutcome, BridgeError> {
        let outcome: Option<ImportOutcome> = self
            .call(BackendRequest::ImportCookies {
                provider_id: provider.clone(),
                url: url.to_string(),
                raw_data,
            })
            .await?;
        Ok(outcome.unwrap_or_default())
    }

    async fn update_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
    ) -> Result<(), BridgeError> {
        let _: Value = self
            .call(BackendRequest::UpdateAccountStatus {
                account_id: account_id.to_string(),
                status,
            })
            .await?;
        Ok(())
    }

    async fn sync_account_credits(&self, account_id: &str) -> Result<AccountCredits, BridgeError> {
        self.call(BackendRequest::SyncAccountCredits {
            account_id: account_id.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned responses and records what was sent
    struct ScriptedTransport {
        responses: Mutex<Vec<Value>>,
        sent: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                responses: Mutex::new(responses),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &BackendRequest) -> Result<Value, BridgeError> {
            self.sent
                .lock()
                .unwrap()
                .push(serde_json::to_value(request).unwrap());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(BridgeError::Unavailable("no scripted response".into()));
            }
            Ok(responses.remove(0))
        }
    }

    #[test]
    fn test_request_wire_format() {
        let import = BackendRequest::ImportCookies {
            provider_id: ProviderId::from("claude"),
            url: "https://claude.ai/new".into(),
            raw_data: json!({"cookies": []}),
        };
        assert_eq!(
            serde_json::to_value(&import).unwrap(),
            json!({
                "action": "importCookies",
                "providerId": "claude",
                "url": "https://claude.ai/new",
                "rawData": {"cookies": []}
            })
        );

        let status = BackendRequest::UpdateAccountStatus {
            account_id: "acc-1".into(),
            status: AccountStatus::LoggedOut,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"action": "updateAccountStatus", "accountId": "acc-1", "status": "logged_out"})
        );
        assert_eq!(
            serde_json::to_value(BackendRequest::GetSettings).unwrap(),
            json!({"action": "getSettings"})
        );
        assert_eq!(status.action(), "updateAccountStatus");
    }

    #[test]
    fn test_accounts_updated_event() {
        let event: BackendEvent = serde_json::from_value(json!({
            "action": "accountsUpdated",
            "accounts": [
                {"id": "a1", "provider": "suno", "label": "Work", "credits": 250.0}
            ]
        }))
        .unwrap();

        let BackendEvent::AccountsUpdated { accounts } = event;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider, ProviderId::from("suno"));
        assert_eq!(accounts[0].credits, Some(250.0));
    }

    #[tokio::test]
    async fn test_detect_provider_decodes_null() {
        let backend = MessageBackend::new(ScriptedTransport::new(vec![
            json!({"success": true, "data": {"providerId": "gemini"}}),
            json!({"success": true, "data": {"providerId": null}}),
            json!({"success": true}),
        ]));

        assert_eq!(
            backend.detect_provider("https://gemini.google.com/app").await.unwrap(),
            Some(ProviderId::from("gemini"))
        );
        assert_eq!(backend.detect_provider("https://example.com").await.unwrap(), None);
        assert_eq!(backend.detect_provider("https://example.org").await.unwrap(), None);

        let sent = backend.transport.sent.lock().unwrap();
        assert_eq!(sent[0], json!({"action": "detectProvider", "url": "https://gemini.google.com/app"}));
    }

    #[tokio::test]
    async fn test_rejected_message() {
        let backend = MessageBackend::new(ScriptedTransport::new(vec![json!({
            "success": false,
            "error": "session expired"
        })]));

        let err = backend
            .import_cookies(&ProviderId::from("claude"), "https://claude.ai", json!({}))
            .await
            .unwrap_err();
        match err {
            BridgeError::Rejected { action, message } => {
                assert_eq!(action, "importCookies");
                assert_eq!(message, "session expired");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_settings_default_when_missing() {
        let backend = MessageBackend::new(ScriptedTransport::new(vec![json!({"success": true})]));
        assert_eq!(backend.get_settings().await.unwrap(), RemoteSettings::default());
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let backend = MessageBackend::new(ScriptedTransport::new(vec![json!("ok")]));
        assert!(matches!(
            backend.sync_account_credits("acc-1").await,
            Err(BridgeError::Decode(_))
        ));
    }
}
