use std::time::Duration;

use async_trait::async_trait;
use pricepost_core::config::TelegramConfig;
use pricepost_core::errors::ApplicationError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("http client could not be built: {0}")]
    Setup(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

impl From<TransportError> for ApplicationError {
    fn from(error: TransportError) -> Self {
        Self::Integration(error.to_string())
    }
}

/// Envelope every Bot API method answers with, whatever the HTTP status.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("no description")
    }
}

#[async_trait]
pub trait BotApi: Send + Sync {
    async fn call(&self, method: &str, payload: &Value) -> Result<ApiResponse, TransportError>;
}

/// Bot API over HTTPS. Requests are `POST {base_url}/bot{token}/{method}` with a JSON body.
pub struct HttpBotApi {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpBotApi {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Setup(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, token })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        Self::new(
            config.api_base_url.clone(),
            config.bot_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn call(&self, method: &str, payload: &Value) -> Result<ApiResponse, TransportError> {
        // Errors are stripped of their URL: it embeds the token.
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.without_url().to_string()))?;

        let status = response.status();
        debug!(event_name = "telegram.api.response", method, status = %status, "bot api responded");

        response
            .json::<ApiResponse>()
            .await
            .map_err(|error| TransportError::Decode(format!("{status}: {}", error.without_url())))
    }
}
