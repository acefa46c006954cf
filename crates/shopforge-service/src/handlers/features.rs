//! Add-on feature enablement handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use shopforge_core::{
    AuditRecord, Feature, ShopStatus, Subscription, TransactionReason, CHATBOT_FEATURE_COST,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::shops::{ensure_shop_secret, load_owned_shop};
use crate::providers::chatbot::TenantRegistration;
use crate::state::AppState;

/// Feature enablement response.
#[derive(Debug, Serialize)]
pub struct EnableFeatureResponse {
    /// The enabled feature.
    pub feature: Feature,
    /// Subscription status.
    pub status: String,
    /// Bot identifier from the chatbot backend.
    pub bot_id: String,
    /// Subscription renewal date (RFC 3339).
    pub expires_at: String,
}

/// Enable the chatbot add-on for a shop.
///
/// The ledger is charged before the remote calls; a failed tenant
/// registration refunds the charge. Environment injection after a
/// successful registration is non-fatal.
pub async fn enable_chatbot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(shop_id): Path<String>,
) -> Result<Json<EnableFeatureResponse>, ApiError> {
    let mut shop = load_owned_shop(&state, &auth, &shop_id)?;

    if shop.status == ShopStatus::Deleted {
        return Err(ApiError::Conflict("shop is deleted".into()));
    }
    if shop.chatbot_enabled {
        return Err(ApiError::Conflict("chatbot is already enabled".into()));
    }

    let chatbot = state
        .chatbot
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("chatbot backend not configured".into()))?;

    // Charge first; 402 with no side effects on insufficient credits.
    state.store.debit(
        &auth.user_id,
        CHATBOT_FEATURE_COST,
        TransactionReason::FeatureEnablement,
        Some(shop.id),
    )?;

    let secret = ensure_shop_secret(&state, &shop)?;
    let base_url = shop.base_url(&state.config.platform_app_domain);

    let bot_id = match chatbot
        .register_tenant(TenantRegistration {
            slug: &shop.slug,
            shop_name: &shop.shop_name,
            base_url: &base_url,
            sso_secret: &secret.sso_secret,
        })
        .await
    {
        Ok(bot_id) => bot_id,
        Err(e) => {
            // Nothing was created remotely; compensate the debit.
            tracing::warn!(shop_id = %shop.id, error = %e, "chatbot registration failed; refunding");
            if let Err(refund_err) = state.store.credit(
                &auth.user_id,
                CHATBOT_FEATURE_COST,
                TransactionReason::Refund,
                Some(shop.id),
            ) {
                tracing::error!(
                    user_id = %auth.user_id,
                    shop_id = %shop.id,
                    error = %refund_err,
                    "compensating refund failed"
                );
            }
            return Err(ApiError::ExternalService(format!(
                "chatbot registration failed: {e}"
            )));
        }
    };

    // Feature environment for the shop instance. Partial failure is
    // logged; the tenant is already registered, so enablement proceeds.
    if let Some(compute) = &state.compute {
        let vars = vec![
            ("CHATBOT_ENABLED".to_string(), "true".to_string()),
            ("CHATBOT_BOT_ID".to_string(), bot_id.clone()),
            ("CHATBOT_SSO_SECRET".to_string(), secret.sso_secret.clone()),
        ];
        if let Err(e) = compute.put_secrets(&shop.app_name, &vars).await {
            tracing::warn!(
                shop_id = %shop.id,
                app_name = %shop.app_name,
                error = %e,
                "chatbot environment injection incomplete"
            );
        }
    }

    let subscription = Subscription::activate(shop.id, Feature::Chatbot);
    state.store.put_subscription(&subscription)?;

    let now = chrono::Utc::now();
    shop.chatbot_enabled = true;
    shop.chatbot_bot_id = Some(bot_id.clone());
    shop.chatbot_enabled_at = Some(now);
    shop.updated_at = now;
    state.store.put_shop(&shop)?;

    let _ = state.store.append_audit(&AuditRecord::new(
        "feature.enable",
        "shop",
        shop.id.to_string(),
        auth.user_id.to_string(),
        serde_json::json!({
            "feature": "chatbot",
            "bot_id": bot_id,
            "cost": CHATBOT_FEATURE_COST,
        }),
    ));

    tracing::info!(shop_id = %shop.id, bot_id = %bot_id, "chatbot enabled");

    Ok(Json(EnableFeatureResponse {
        feature: Feature::Chatbot,
        status: "active".into(),
        bot_id,
        expires_at: subscription.expires_at.to_rfc3339(),
    }))
}
