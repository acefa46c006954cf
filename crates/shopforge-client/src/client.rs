//! Shopforge HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, CreateShopRequest, CreateShopResponse, ShopDetail,
};

/// Options for constructing a [`ShopforgeClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

/// Shopforge API client.
///
/// Calls are authenticated with the caller's bearer token.
#[derive(Debug, Clone)]
pub struct ShopforgeClient {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl ShopforgeClient {
    /// Create a new shopforge client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g. `"http://shopforge:8080"`)
    /// * `bearer_token` - Bearer token for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self::with_options(base_url, bearer_token, ClientOptions::default())
    }

    /// Create a new shopforge client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Create a shop. The server answers `202 Accepted`; provisioning is
    /// asynchronous and its outcome is read back via [`Self::get_shop`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an
    /// error, including `ClientError::InsufficientCredits` (402) and
    /// `ClientError::SlugTaken` (409).
    pub async fn create_shop(
        &self,
        request: CreateShopRequest,
    ) -> Result<CreateShopResponse, ClientError> {
        let url = format!("{}/v1/shops", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.bearer_token))
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get one shop with its latest deployment state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_shop(&self, shop_id: &str) -> Result<ShopDetail, ClientError> {
        let url = format!("{}/v1/shops/{shop_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {}", self.bearer_token))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the caller's credit balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/credits/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {}", self.bearer_token))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let body = api_error.error;
                tracing::debug!(code = %body.code, status = %status, "API request failed");
                match body.code.as_str() {
                    "insufficient_credits" => {
                        let details = body.details.unwrap_or_default();
                        Err(ClientError::InsufficientCredits {
                            have: details.get("have").and_then(serde_json::Value::as_i64).unwrap_or(0),
                            need: details.get("need").and_then(serde_json::Value::as_i64).unwrap_or(0),
                        })
                    }
                    "conflict" => Err(ClientError::SlugTaken {
                        message: body.message,
                    }),
                    _ => Err(ClientError::Api {
                        code: body.code,
                        message: body.message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".into(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn client_trims_trailing_slash() {
        let client = ShopforgeClient::new("http://localhost:8080/", "token");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn create_shop_accepted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/shops"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "shop_id": "0c5c4c1e-1b2f-4a56-9a9e-1f6f2f5c0001",
                "slug": "acme",
                "app_name": "sf-acme",
                "deployment_id": "0c5c4c1e-1b2f-4a56-9a9e-1f6f2f5c0002",
                "status": "queued",
            })))
            .mount(&server)
            .await;

        let client = ShopforgeClient::new(server.uri(), "tok");
        let response = client
            .create_shop(CreateShopRequest {
                shop_name: "Acme".into(),
                admin_email: "admin@acme.com".into(),
                admin_password: "secret-pass".into(),
                plan: None,
            })
            .await
            .unwrap();

        assert_eq!(response.slug, "acme");
        assert_eq!(response.status, "queued");
    }

    #[tokio::test]
    async fn insufficient_credits_is_typed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/shops"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {
                    "code": "insufficient_credits",
                    "message": "insufficient credits: have=0, need=1000",
                    "details": { "have": 0, "need": 1000 },
                }
            })))
            .mount(&server)
            .await;

        let client = ShopforgeClient::new(server.uri(), "tok");
        let result = client
            .create_shop(CreateShopRequest {
                shop_name: "Acme".into(),
                admin_email: "admin@acme.com".into(),
                admin_password: "secret-pass".into(),
                plan: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(ClientError::InsufficientCredits { have: 0, need: 1000 })
        ));
    }

    #[tokio::test]
    async fn conflict_is_typed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/shops"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {
                    "code": "conflict",
                    "message": "shop name is taken: acme",
                }
            })))
            .mount(&server)
            .await;

        let client = ShopforgeClient::new(server.uri(), "tok");
        let result = client
            .create_shop(CreateShopRequest {
                shop_name: "Acme".into(),
                admin_email: "admin@acme.com".into(),
                admin_password: "secret-pass".into(),
                plan: None,
            })
            .await;

        assert!(matches!(result, Err(ClientError::SlugTaken { .. })));
    }

    #[tokio::test]
    async fn get_balance_roundtrip() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/credits/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "credits": 1000,
                "first_shop_redeemed": true,
            })))
            .mount(&server)
            .await;

        let client = ShopforgeClient::new(server.uri(), "tok");
        let balance = client.get_balance().await.unwrap();
        assert_eq!(balance.credits, 1000);
        assert!(balance.first_shop_redeemed);
    }
}
