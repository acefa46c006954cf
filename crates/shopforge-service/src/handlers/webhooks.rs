//! Inbound deployment webhook.
//!
//! A bearer-token-authenticated callback from the provisioning pipeline,
//! used as a supplementary signal alongside polling. Terminal statuses go
//! through the same commit path as the monitor, so shop transitions and
//! notifications behave identically.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use shopforge_core::DeploymentEvent;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Deployment webhook payload.
#[derive(Debug, Deserialize)]
pub struct DeploymentWebhook {
    /// Platform app name identifying the shop.
    pub app_name: String,
    /// Reported status: `success`, `failed`, or an intermediate string.
    pub status: String,
    /// Optional detail message.
    pub message: Option<String>,
    /// Workflow run id the report belongs to.
    pub run_id: Option<String>,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
}

/// Handle a deployment status callback.
pub async fn deployment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DeploymentWebhook>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let shop = state
        .store
        .get_shop_by_app_name(&body.app_name)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown app: {}", body.app_name)))?;

    // The bearer token must match the shop's stored webhook secret.
    let secret = state
        .store
        .get_shop_secret(&shop.id)?
        .ok_or(ApiError::Unauthorized)?;
    if !constant_time_eq(token, &secret.webhook_secret) {
        return Err(ApiError::Unauthorized);
    }

    let deployment = state
        .store
        .latest_deployment_for_shop(&shop.id)?
        .ok_or_else(|| ApiError::NotFound("no deployment for shop".into()))?;

    if let Some(run_id) = &body.run_id {
        if deployment.external_run_id.as_deref() != Some(run_id.as_str()) {
            return Err(ApiError::NotFound(format!("unknown run: {run_id}")));
        }
    }

    tracing::info!(
        shop_id = %shop.id,
        deployment_id = %deployment.id,
        status = %body.status,
        "deployment webhook received"
    );

    if deployment.is_terminal() {
        // Polling already committed; nothing to update.
        return Ok(Json(WebhookResponse { received: true }));
    }

    match body.status.as_str() {
        "success" => {
            state.monitor.commit_terminal(
                deployment.id,
                true,
                body.message.as_deref().unwrap_or("reported via webhook"),
            );
        }
        "failed" | "failure" => {
            state.monitor.commit_terminal(
                deployment.id,
                false,
                body.message
                    .as_deref()
                    .unwrap_or("failure reported via webhook"),
            );
        }
        other => {
            // Intermediate signal: record it, commit nothing.
            let mut deployment = deployment;
            deployment.push_event(DeploymentEvent::WorkflowStatus {
                status: other.to_string(),
                at: chrono::Utc::now(),
            });
            if let Err(e) = state.store.update_deployment(&deployment) {
                tracing::warn!(deployment_id = %deployment.id, error = %e, "webhook event write failed");
            }
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}
