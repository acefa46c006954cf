//! Shop lifecycle handlers: create, list, get, soft delete, SSO token.
//!
//! `create_shop` is the synchronous half of provisioning: it validates,
//! bills, persists the Shop/Deployment records, and enqueues the job. The
//! response is always `202 Accepted` — the outcome arrives asynchronously
//! via the worker and monitor.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use shopforge_core::{
    slugify, AuditRecord, Deployment, DeploymentEvent, DeploymentStatus, Plan, ProvisionJob, Shop,
    ShopId, ShopStatus, TransactionReason, SHOP_CREATION_COST,
};

use crate::auth::AuthUser;
use crate::crypto::generate_secret;
use crate::error::ApiError;
use crate::sso::mint_sso_token;
use crate::state::AppState;

/// Shop creation request.
#[derive(Debug, Deserialize)]
pub struct CreateShopRequest {
    /// Display name; the slug and app name derive from it.
    pub shop_name: String,
    /// Admin email for the provisioned instance.
    pub admin_email: String,
    /// Admin password for the provisioned instance.
    pub admin_password: String,
    /// Billing plan (default: starter).
    #[serde(default)]
    pub plan: Option<Plan>,
}

/// Shop creation response (202).
#[derive(Debug, Serialize)]
pub struct CreateShopResponse {
    /// The new shop ID.
    pub shop_id: String,
    /// Derived slug.
    pub slug: String,
    /// Derived platform app name.
    pub app_name: String,
    /// The deployment tracking this provisioning attempt.
    pub deployment_id: String,
    /// Always `queued`: provisioning is asynchronous.
    pub status: DeploymentStatus,
}

/// Create a shop and enqueue its provisioning job.
pub async fn create_shop(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateShopRequest>,
) -> Result<(StatusCode, Json<CreateShopResponse>), ApiError> {
    // Validation: fail fast, no side effects.
    let shop_name = body.shop_name.trim();
    let slug = slugify(shop_name);
    if slug.is_empty() {
        return Err(ApiError::BadRequest(
            "shop name must contain at least one alphanumeric character".into(),
        ));
    }
    if !body.admin_email.contains('@') {
        return Err(ApiError::BadRequest("invalid admin email".into()));
    }
    if body.admin_password.len() < 8 {
        return Err(ApiError::BadRequest(
            "admin password must be at least 8 characters".into(),
        ));
    }

    // Uniqueness: 409 before any billing happens. Races are caught again
    // by the store's slug claim below.
    if state.store.get_shop_by_slug(&slug)?.is_some() {
        return Err(ApiError::Conflict(format!("shop name is taken: {slug}")));
    }

    let mut user = state
        .store
        .get_user(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("account not registered".into()))?;

    let shop = Shop::new(auth.user_id, shop_name, body.plan.unwrap_or(Plan::Starter));

    // Billing: the first shop consumes the one-time free grant; after
    // that, a fixed debit. Insufficient credits surface as 402 before any
    // record is written.
    let mut debited = 0i64;
    if user.first_shop_redeemed {
        state.store.debit(
            &auth.user_id,
            SHOP_CREATION_COST,
            TransactionReason::ShopCreation,
            Some(shop.id),
        )?;
        debited = SHOP_CREATION_COST;
    } else {
        user.first_shop_redeemed = true;
        user.updated_at = chrono::Utc::now();
        state.store.put_user(&user)?;
        tracing::info!(user_id = %user.id, shop_id = %shop.id, "free shop grant consumed");
    }

    if let Err(e) = state.store.create_shop(&shop) {
        // Lost the slug race after the debit: compensate and surface the
        // conflict. A consumed free grant stays consumed.
        refund_if_debited(&state, &auth, &shop, debited);
        return Err(e.into());
    }

    let deployment = Deployment::new(shop.id);
    if let Err(e) = state.store.create_deployment(&deployment) {
        refund_if_debited(&state, &auth, &shop, debited);
        mark_creation_failed(&state, &shop, &deployment, "deployment record write failed");
        return Err(e.into());
    }

    let job = ProvisionJob::new(
        shop.id,
        deployment.id,
        auth.user_id,
        body.admin_email.trim(),
        body.admin_password.as_str(),
    );

    if let Err(e) = state.queue.enqueue(&job) {
        // Queue unavailable after the debit: refund, write an explicit
        // operator-actionable failed state, and surface the error. No
        // silent pending shops.
        tracing::error!(
            shop_id = %shop.id,
            deployment_id = %deployment.id,
            error = %e,
            "provisioning queue unavailable; compensating shop creation"
        );
        refund_if_debited(&state, &auth, &shop, debited);
        mark_creation_failed(&state, &shop, &deployment, "provisioning queue unavailable");

        let _ = state.store.append_audit(&AuditRecord::new(
            "shop.create_failed",
            "shop",
            shop.id.to_string(),
            auth.user_id.to_string(),
            serde_json::json!({ "error": "queue unavailable", "refunded": debited }),
        ));

        return Err(ApiError::Unavailable(
            "provisioning queue unavailable; the charge was refunded".into(),
        ));
    }

    let _ = state.store.append_audit(&AuditRecord::new(
        "shop.create",
        "shop",
        shop.id.to_string(),
        auth.user_id.to_string(),
        serde_json::json!({
            "slug": shop.slug,
            "app_name": shop.app_name,
            "deployment_id": deployment.id.to_string(),
            "debited": debited,
        }),
    ));

    tracing::info!(
        shop_id = %shop.id,
        slug = %shop.slug,
        deployment_id = %deployment.id,
        "shop creation accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateShopResponse {
            shop_id: shop.id.to_string(),
            slug: shop.slug,
            app_name: shop.app_name,
            deployment_id: deployment.id.to_string(),
            status: DeploymentStatus::Queued,
        }),
    ))
}

/// Compensating credit for a failed synchronous step. The free-grant flag
/// is never reversed: a used grant stays used.
fn refund_if_debited(state: &AppState, auth: &AuthUser, shop: &Shop, debited: i64) {
    if debited == 0 {
        return;
    }
    if let Err(e) = state.store.credit(
        &auth.user_id,
        debited,
        TransactionReason::Refund,
        Some(shop.id),
    ) {
        tracing::error!(
            user_id = %auth.user_id,
            shop_id = %shop.id,
            error = %e,
            "compensating refund failed"
        );
    }
}

/// Write the explicit failed state for a creation that never reached the
/// queue.
fn mark_creation_failed(state: &AppState, shop: &Shop, deployment: &Deployment, message: &str) {
    let now = chrono::Utc::now();

    if let Ok(Some(mut stored)) = state.store.get_shop(&shop.id) {
        stored.status = ShopStatus::Failed;
        stored.updated_at = now;
        if let Err(e) = state.store.put_shop(&stored) {
            tracing::error!(shop_id = %shop.id, error = %e, "failed to mark shop failed");
        }
    }

    if let Ok(Some(mut stored)) = state.store.get_deployment(&deployment.id) {
        if !stored.is_terminal() {
            stored.status = DeploymentStatus::Failed;
            stored.error_message = Some(message.to_string());
            stored.completed_at = Some(now);
            stored.push_event(DeploymentEvent::Terminal {
                outcome: DeploymentStatus::Failed,
                message: message.to_string(),
                at: now,
            });
            if let Err(e) = state.store.update_deployment(&stored) {
                tracing::error!(deployment_id = %deployment.id, error = %e, "failed to mark deployment failed");
            }
        }
    }
}

/// Shop summary for listings.
#[derive(Debug, Serialize)]
pub struct ShopSummary {
    /// Shop ID.
    pub id: String,
    /// Display name.
    pub shop_name: String,
    /// Slug.
    pub slug: String,
    /// Platform app name.
    pub app_name: String,
    /// Lifecycle status.
    pub status: ShopStatus,
    /// Billing plan.
    pub plan: Plan,
    /// Whether the chatbot add-on is enabled.
    pub chatbot_enabled: bool,
    /// Creation time (RFC 3339).
    pub created_at: String,
}

impl From<&Shop> for ShopSummary {
    fn from(shop: &Shop) -> Self {
        Self {
            id: shop.id.to_string(),
            shop_name: shop.shop_name.clone(),
            slug: shop.slug.clone(),
            app_name: shop.app_name.clone(),
            status: shop.status,
            plan: shop.plan,
            chatbot_enabled: shop.chatbot_enabled,
            created_at: shop.created_at.to_rfc3339(),
        }
    }
}

/// List the authenticated user's shops, newest first.
pub async fn list_shops(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let shops = state.store.list_shops_by_owner(&auth.user_id)?;
    let shops: Vec<ShopSummary> = shops.iter().map(ShopSummary::from).collect();
    Ok(Json(serde_json::json!({ "shops": shops })))
}

/// Deployment summary embedded in shop detail.
#[derive(Debug, Serialize)]
pub struct DeploymentSummary {
    /// Deployment ID.
    pub id: String,
    /// Status.
    pub status: DeploymentStatus,
    /// Workflow provider run id, once dispatched.
    pub external_run_id: Option<String>,
    /// Terminal error message, if failed.
    pub error_message: Option<String>,
    /// Completion time (RFC 3339), once terminal.
    pub completed_at: Option<String>,
}

/// Shop detail response.
#[derive(Debug, Serialize)]
pub struct ShopDetail {
    /// Summary fields.
    #[serde(flatten)]
    pub summary: ShopSummary,
    /// Scheduled hard delete time, when soft-deleted.
    pub scheduled_hard_delete_at: Option<String>,
    /// The latest (authoritative) deployment.
    pub deployment: Option<DeploymentSummary>,
}

/// Get one shop with its latest deployment state.
pub async fn get_shop(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(shop_id): Path<String>,
) -> Result<Json<ShopDetail>, ApiError> {
    let shop = load_owned_shop(&state, &auth, &shop_id)?;

    let deployment = state
        .store
        .latest_deployment_for_shop(&shop.id)?
        .map(|dep| DeploymentSummary {
            id: dep.id.to_string(),
            status: dep.status,
            external_run_id: dep.external_run_id.clone(),
            error_message: dep.error_message.clone(),
            completed_at: dep.completed_at.map(|t| t.to_rfc3339()),
        });

    Ok(Json(ShopDetail {
        summary: ShopSummary::from(&shop),
        scheduled_hard_delete_at: shop.scheduled_hard_delete_at.map(|t| t.to_rfc3339()),
        deployment,
    }))
}

/// Soft-delete a shop: mark it deleted and schedule the hard delete. No
/// remote teardown happens here.
pub async fn delete_shop(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(shop_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut shop = load_owned_shop(&state, &auth, &shop_id)?;

    if shop.status != ShopStatus::Deleted {
        shop.soft_delete();
        state.store.put_shop(&shop)?;

        let _ = state.store.append_audit(&AuditRecord::new(
            "shop.soft_delete",
            "shop",
            shop.id.to_string(),
            auth.user_id.to_string(),
            serde_json::json!({
                "scheduled_hard_delete_at": shop.scheduled_hard_delete_at,
            }),
        ));

        tracing::info!(shop_id = %shop.id, "shop soft-deleted");
    }

    Ok(Json(serde_json::json!({
        "status": shop.status,
        "scheduled_hard_delete_at": shop.scheduled_hard_delete_at,
    })))
}

/// Mint a short-lived cross-service SSO token for the shop.
pub async fn sso_token(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(shop_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let shop = load_owned_shop(&state, &auth, &shop_id)?;

    let secret = ensure_shop_secret(&state, &shop)?;
    let token = mint_sso_token(&shop, &secret.sso_secret, "owner")
        .map_err(|e| ApiError::Internal(format!("token minting failed: {e}")))?;

    Ok(Json(serde_json::json!({
        "token": token,
        "expires_in": 3600,
    })))
}

/// Load a shop and check ownership.
pub(crate) fn load_owned_shop(
    state: &AppState,
    auth: &AuthUser,
    shop_id: &str,
) -> Result<Shop, ApiError> {
    let shop_id: ShopId = shop_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid shop id".into()))?;

    let shop = state
        .store
        .get_shop(&shop_id)?
        .ok_or_else(|| ApiError::NotFound(format!("shop not found: {shop_id}")))?;

    if shop.owner_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }

    Ok(shop)
}

/// Generate or load the shop's secret material (used by SSO and feature
/// enablement).
pub(crate) fn ensure_shop_secret(
    state: &AppState,
    shop: &Shop,
) -> Result<shopforge_core::ShopSecret, ApiError> {
    if let Some(existing) = state.store.get_shop_secret(&shop.id)? {
        return Ok(existing);
    }
    let secret = shopforge_core::ShopSecret::new(shop.id, generate_secret(), generate_secret());
    state.store.put_shop_secret(&secret)?;
    Ok(secret)
}
