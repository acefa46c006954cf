//! Operator endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::AdminAuth;
use crate::cleanup::CleanupService;
use crate::error::ApiError;
use crate::state::AppState;

/// Run one hard-delete cleanup sweep. This is the entry point an external
/// scheduler triggers periodically.
pub async fn run_cleanup(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
) -> Result<Json<serde_json::Value>, ApiError> {
    let service = CleanupService::new(state.store.clone(), state.compute.clone());
    let report = service
        .sweep(chrono::Utc::now())
        .await
        .map_err(ApiError::from)?;

    tracing::info!(
        admin = %admin.admin_id,
        scanned = %report.scanned,
        deleted = %report.deleted,
        remote_failures = %report.remote_failures,
        "cleanup sweep finished"
    );

    Ok(Json(serde_json::json!({ "report": report })))
}
