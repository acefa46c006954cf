//! Request and response types for the shopforge client.

use serde::{Deserialize, Serialize};

/// Shop creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateShopRequest {
    /// Display name; slug and app name derive from it.
    pub shop_name: String,
    /// Admin email for the provisioned instance.
    pub admin_email: String,
    /// Admin password for the provisioned instance.
    pub admin_password: String,
    /// Billing plan (`starter` or `business`; server default when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// Shop creation response (202 Accepted).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShopResponse {
    /// The new shop ID.
    pub shop_id: String,
    /// Derived slug.
    pub slug: String,
    /// Derived platform app name.
    pub app_name: String,
    /// Deployment tracking this provisioning attempt.
    pub deployment_id: String,
    /// Always `queued`.
    pub status: String,
}

/// Latest deployment embedded in shop detail.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSummary {
    /// Deployment ID.
    pub id: String,
    /// Status: `queued`, `running`, `success`, or `failed`.
    pub status: String,
    /// Workflow provider run id, once dispatched.
    pub external_run_id: Option<String>,
    /// Terminal error message, if failed.
    pub error_message: Option<String>,
    /// Completion time (RFC 3339), once terminal.
    pub completed_at: Option<String>,
}

/// Shop detail response.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopDetail {
    /// Shop ID.
    pub id: String,
    /// Display name.
    pub shop_name: String,
    /// Slug.
    pub slug: String,
    /// Platform app name.
    pub app_name: String,
    /// Lifecycle status.
    pub status: String,
    /// Billing plan.
    pub plan: String,
    /// Whether the chatbot add-on is enabled.
    pub chatbot_enabled: bool,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Scheduled hard delete time, when soft-deleted.
    pub scheduled_hard_delete_at: Option<String>,
    /// The latest (authoritative) deployment.
    pub deployment: Option<DeploymentSummary>,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub credits: i64,
    /// Whether the free shop grant has been used.
    pub first_shop_redeemed: bool,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
