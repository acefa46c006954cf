//! Chatbot backend client.
//!
//! Registers shop tenants with the chat assistant service when the feature
//! is enabled. The backend validates cross-service SSO tokens with the
//! shop's stored signing secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Timeout for chatbot API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for chatbot backend operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatbotError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chatbot API returned an error.
    #[error("chatbot API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Tenant registration payload.
#[derive(Debug, Clone)]
pub struct TenantRegistration<'a> {
    /// The shop's slug, used as the tenant key.
    pub slug: &'a str,

    /// Display name of the shop.
    pub shop_name: &'a str,

    /// The shop's public base URL.
    pub base_url: &'a str,

    /// SSO signing secret the backend will validate tokens with.
    pub sso_secret: &'a str,
}

/// Interface to the chatbot backend.
#[async_trait]
pub trait ChatbotProvider: Send + Sync {
    /// Register a shop tenant. Returns the backend's bot identifier.
    async fn register_tenant(
        &self,
        registration: TenantRegistration<'_>,
    ) -> Result<String, ChatbotError>;
}

/// HTTP client for the chatbot backend.
#[derive(Debug, Clone)]
pub struct HttpChatbotClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    bot_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatbotErrorResponse {
    error: Option<String>,
}

impl HttpChatbotClient {
    /// Create a new chatbot backend client.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Configuration` if the token is empty or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, ChatbotError> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(ChatbotError::Configuration(
                "chatbot API token is empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| ChatbotError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl ChatbotProvider for HttpChatbotClient {
    async fn register_tenant(
        &self,
        registration: TenantRegistration<'_>,
    ) -> Result<String, ChatbotError> {
        let url = format!("{}/v1/tenants", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&serde_json::json!({
                "tenant": registration.slug,
                "name": registration.shop_name,
                "base_url": registration.base_url,
                "sso_secret": registration.sso_secret,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = match response.json::<ChatbotErrorResponse>().await {
                Ok(body) => body.error.unwrap_or_else(|| format!("HTTP {status}")),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(ChatbotError::Api { status, message });
        }

        let body: RegisterResponse = response.json().await?;
        Ok(body.bot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_token() {
        let result = HttpChatbotClient::new("https://chat.example.dev", "");
        assert!(matches!(result, Err(ChatbotError::Configuration(_))));
    }
}
