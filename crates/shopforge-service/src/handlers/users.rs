//! User registration handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use shopforge_core::{AuditRecord, TransactionReason, User};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Contact email.
    pub email: String,
}

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// The user ID.
    pub user_id: String,
    /// Current credit balance.
    pub credits: i64,
    /// Whether the free shop grant has been used.
    pub first_shop_redeemed: bool,
}

/// Register the authenticated user. Idempotent: an existing account is
/// returned unchanged.
pub async fn register(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if let Some(existing) = state.store.get_user(&auth.user_id)? {
        return Ok(Json(RegisterResponse {
            user_id: existing.id.to_string(),
            credits: existing.credits,
            first_shop_redeemed: existing.first_shop_redeemed,
        }));
    }

    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email".into()));
    }

    let user = User::new(auth.user_id, body.email.trim());
    state.store.put_user(&user)?;

    let mut credits = 0;
    if state.config.initial_grant_credits > 0 {
        credits = state.store.credit(
            &user.id,
            state.config.initial_grant_credits,
            TransactionReason::InitialGrant,
            None,
        )?;
    }

    let _ = state.store.append_audit(&AuditRecord::new(
        "user.register",
        "user",
        user.id.to_string(),
        user.id.to_string(),
        serde_json::json!({ "initial_grant": state.config.initial_grant_credits }),
    ));

    tracing::info!(user_id = %user.id, "user registered");

    Ok(Json(RegisterResponse {
        user_id: user.id.to_string(),
        credits,
        first_shop_redeemed: false,
    }))
}
