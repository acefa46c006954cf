//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/shopforge").
    pub data_dir: String,

    /// JWT validation base URL for end-user auth.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "shopforge").
    pub auth_audience: String,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// Compute platform API URL (optional; provisioning degrades without it).
    pub platform_api_url: Option<String>,

    /// Compute platform API token.
    pub platform_api_token: Option<String>,

    /// Domain under which platform apps are served, e.g. `shops.example.dev`.
    pub platform_app_domain: String,

    /// Workflow provider API URL (optional).
    pub workflow_api_url: Option<String>,

    /// Workflow provider API token.
    pub workflow_api_token: Option<String>,

    /// Name of the provisioning workflow to dispatch.
    pub workflow_name: String,

    /// Git ref the workflow runs on.
    pub workflow_ref: String,

    /// Chatbot backend API URL (optional; feature enablement fails without it).
    pub chatbot_api_url: Option<String>,

    /// Chatbot backend API token.
    pub chatbot_api_token: Option<String>,

    /// Outbound notification webhook URL (optional).
    pub notify_webhook_url: Option<String>,

    /// Object-storage access key injected into shops when set.
    pub storage_access_key: Option<String>,

    /// Object-storage secret key injected into shops when set.
    pub storage_secret_key: Option<String>,

    /// Bounded worker pool size for provisioning jobs.
    pub worker_concurrency: usize,

    /// Credits granted at registration.
    pub initial_grant_credits: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_or("LISTEN_ADDR", "0.0.0.0:8080"),
            data_dir: env_or("DATA_DIR", "/data/shopforge"),
            auth_base_url: env_or("AUTH_BASE_URL", "https://id.shopforge.dev"),
            auth_audience: env_or("AUTH_AUDIENCE", "shopforge"),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            platform_api_url: std::env::var("PLATFORM_API_URL").ok(),
            platform_api_token: std::env::var("PLATFORM_API_TOKEN").ok(),
            platform_app_domain: env_or("PLATFORM_APP_DOMAIN", "shops.shopforge.dev"),
            workflow_api_url: std::env::var("WORKFLOW_API_URL").ok(),
            workflow_api_token: std::env::var("WORKFLOW_API_TOKEN").ok(),
            workflow_name: env_or("WORKFLOW_NAME", "provision-shop"),
            workflow_ref: env_or("WORKFLOW_REF", "main"),
            chatbot_api_url: std::env::var("CHATBOT_API_URL").ok(),
            chatbot_api_token: std::env::var("CHATBOT_API_TOKEN").ok(),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
            storage_access_key: std::env::var("STORAGE_ACCESS_KEY").ok(),
            storage_secret_key: std::env::var("STORAGE_SECRET_KEY").ok(),
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 4),
            initial_grant_credits: parse_env("INITIAL_GRANT_CREDITS", 0),
            cors_origins: env_or("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parse_env("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS", 30),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/shopforge".into(),
            auth_base_url: "https://id.shopforge.dev".into(),
            auth_audience: "shopforge".into(),
            admin_api_key: None,
            platform_api_url: None,
            platform_api_token: None,
            platform_app_domain: "shops.shopforge.dev".into(),
            workflow_api_url: None,
            workflow_api_token: None,
            workflow_name: "provision-shop".into(),
            workflow_ref: "main".into(),
            chatbot_api_url: None,
            chatbot_api_token: None,
            notify_webhook_url: None,
            storage_access_key: None,
            storage_secret_key: None,
            worker_concurrency: 4,
            initial_grant_credits: 0,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
