//! Compute platform client.
//!
//! Manages remote application shells: creation (implicit, idempotent),
//! secret injection, status, health probing, and teardown. Expected remote
//! failures (missing apps, timeouts, unhealthy responses) are returned as
//! data; only configuration problems are errors at construction time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Timeout for platform API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the public health probe. Short on purpose: a healthy app
/// answers its root route quickly.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for compute platform operations.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform API returned an error.
    #[error("platform API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Client misconfiguration (missing credentials, bad URL).
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Platform-level status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// The app exists and is serving.
    Running,

    /// The app exists but is still rolling out.
    Deploying,

    /// The app exists but is stopped.
    Stopped,

    /// The platform has no app by that name.
    Missing,

    /// The platform reported something unrecognized.
    Unknown,
}

impl AppState {
    /// Whether the app is up from the platform's point of view.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Result of an HTTP health probe against the app's public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 2xx-3xx response.
    Healthy,

    /// The app answered with a 4xx: reachable but misbehaving.
    Degraded {
        /// The observed status code.
        status: u16,
    },

    /// Timeout, connection error, or 5xx.
    Unreachable {
        /// Probe failure detail.
        detail: String,
    },
}

impl HealthStatus {
    /// Whether the probe counts as healthy.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Short description for deployment events.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Healthy => "healthy".into(),
            Self::Degraded { status } => format!("HTTP {status}"),
            Self::Unreachable { detail } => detail.clone(),
        }
    }
}

/// Interface to the compute platform.
///
/// Injected into the worker, monitor, and cleanup service; tests provide
/// fakes that simulate remote failures without any network access.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Verify or create the remote application shell.
    ///
    /// Creation is implicit on first provisioned resource; calling this for
    /// an existing app is not an error.
    async fn ensure_app(&self, app_name: &str) -> Result<(), ComputeError>;

    /// Upsert a named set of key/value secrets into the app. Idempotent.
    async fn put_secrets(
        &self,
        app_name: &str,
        secrets: &[(String, String)],
    ) -> Result<(), ComputeError>;

    /// Platform-level status of the app.
    async fn app_status(&self, app_name: &str) -> Result<AppState, ComputeError>;

    /// Probe the app's public URL.
    ///
    /// Never fails: timeouts and connection errors classify as
    /// [`HealthStatus::Unreachable`].
    async fn probe_health(&self, app_name: &str) -> HealthStatus;

    /// Destroy the app. Returns `false` when the app was already gone.
    async fn destroy_app(&self, app_name: &str) -> Result<bool, ComputeError>;
}

/// HTTP client for the compute platform's REST API.
#[derive(Debug, Clone)]
pub struct HttpComputeClient {
    client: Client,
    probe_client: Client,
    base_url: String,
    api_token: String,
    app_domain: String,
}

#[derive(Debug, Deserialize)]
struct AppStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PlatformErrorResponse {
    error: Option<String>,
}

impl HttpComputeClient {
    /// Create a new compute platform client.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Configuration` if the token is empty or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        app_domain: impl Into<String>,
    ) -> Result<Self, ComputeError> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(ComputeError::Configuration(
                "platform API token is empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| ComputeError::Configuration(e.to_string()))?;
        let probe_client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| ComputeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            probe_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            app_domain: app_domain.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_token)
    }

    async fn api_error(response: reqwest::Response) -> ComputeError {
        let status = response.status().as_u16();
        let message = match response.json::<PlatformErrorResponse>().await {
            Ok(body) => body.error.unwrap_or_else(|| format!("HTTP {status}")),
            Err(_) => format!("HTTP {status}"),
        };
        ComputeError::Api { status, message }
    }
}

#[async_trait]
impl ComputeProvider for HttpComputeClient {
    async fn ensure_app(&self, app_name: &str) -> Result<(), ComputeError> {
        let url = format!("{}/v1/apps", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "name": app_name }))
            .send()
            .await?;

        // The platform answers 409 when the app shell already exists;
        // creation is idempotent from our side.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            return Ok(());
        }

        Err(Self::api_error(response).await)
    }

    async fn put_secrets(
        &self,
        app_name: &str,
        secrets: &[(String, String)],
    ) -> Result<(), ComputeError> {
        let url = format!("{}/v1/apps/{app_name}/secrets", self.base_url);
        let body: serde_json::Map<String, serde_json::Value> = secrets
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "secrets": body }))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(Self::api_error(response).await)
    }

    async fn app_status(&self, app_name: &str) -> Result<AppState, ComputeError> {
        let url = format!("{}/v1/apps/{app_name}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AppState::Missing);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: AppStatusResponse = response.json().await?;
        Ok(parse_app_state(&body.status))
    }

    async fn probe_health(&self, app_name: &str) -> HealthStatus {
        let url = format!("https://{app_name}.{}/", self.app_domain);

        match self.probe_client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    HealthStatus::Healthy
                } else if status.is_client_error() {
                    HealthStatus::Degraded {
                        status: status.as_u16(),
                    }
                } else {
                    HealthStatus::Unreachable {
                        detail: format!("HTTP {status}"),
                    }
                }
            }
            Err(e) => HealthStatus::Unreachable {
                detail: if e.is_timeout() {
                    "probe timed out".into()
                } else {
                    format!("connection error: {e}")
                },
            },
        }
    }

    async fn destroy_app(&self, app_name: &str) -> Result<bool, ComputeError> {
        let url = format!("{}/v1/apps/{app_name}", self.base_url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            // Already gone; cleanup treats this as done.
            return Ok(false);
        }
        if response.status().is_success() {
            return Ok(true);
        }

        Err(Self::api_error(response).await)
    }
}

/// Map the platform's status string to an [`AppState`].
fn parse_app_state(status: &str) -> AppState {
    match status.to_lowercase().as_str() {
        "running" | "started" => AppState::Running,
        "deploying" | "pending" | "starting" => AppState::Deploying,
        "stopped" | "suspended" | "exited" => AppState::Stopped,
        _ => AppState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_token() {
        let result = HttpComputeClient::new("https://api.platform.dev", "", "shops.example.dev");
        assert!(matches!(result, Err(ComputeError::Configuration(_))));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            HttpComputeClient::new("https://api.platform.dev/", "token", "shops.example.dev")
                .unwrap();
        assert_eq!(client.base_url, "https://api.platform.dev");
    }

    #[test]
    fn app_state_parsing() {
        assert_eq!(parse_app_state("running"), AppState::Running);
        assert_eq!(parse_app_state("Deploying"), AppState::Deploying);
        assert_eq!(parse_app_state("stopped"), AppState::Stopped);
        assert_eq!(parse_app_state("weird"), AppState::Unknown);
    }

    #[test]
    fn health_status_describe() {
        assert_eq!(HealthStatus::Healthy.describe(), "healthy");
        assert_eq!(HealthStatus::Degraded { status: 404 }.describe(), "HTTP 404");
        assert!(HealthStatus::Unreachable {
            detail: "probe timed out".into()
        }
        .describe()
        .contains("timed out"));
    }
}
