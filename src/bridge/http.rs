//! HTTP transport for backend messages
//!
//! Posts each message as JSON to `{base_url}/extension/messages` and returns
//! the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{BackendRequest, BridgeError, MessageBackend, Transport};
use crate::security::Sanitizer;

const MESSAGES_PATH: &str = "/extension/messages";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport for the given backend base URL
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a transport with a preconfigured client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), MESSAGES_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &BackendRequest) -> Result<Value, BridgeError> {
        tracing::debug!(
            action = request.action(),
            endpoint = %Sanitizer::sanitize_url(&self.endpoint),
            "Sending backend message"
        );

        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

impl MessageBackend<HttpTransport> {
    /// Backend reached over HTTP at `base_url`
    pub fn http(base_url: &str) -> Result<Self, BridgeError> {
        Ok(Self::new(HttpTransport::new(base_url)?))
    }
}
