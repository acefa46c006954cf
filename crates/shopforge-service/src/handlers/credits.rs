//! Credit balance and ledger handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use shopforge_core::{AuditRecord, CreditTransaction, TransactionReason};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub credits: i64,
    /// Whether the free shop grant has been used.
    pub first_shop_redeemed: bool,
}

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user = state
        .store
        .get_user(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("account not registered".into()))?;

    Ok(Json(BalanceResponse {
        credits: user.credits,
        first_shop_redeemed: user.first_shop_redeemed,
    }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One ledger entry in a listing.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Signed amount.
    pub amount: i64,
    /// Reason for the entry.
    pub reason: TransactionReason,
    /// Balance after this entry.
    pub balance_after: i64,
    /// Related shop, if any.
    pub related_shop_id: Option<String>,
    /// Timestamp (RFC 3339).
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            reason: tx.reason,
            balance_after: tx.balance_after,
            related_shop_id: tx.related_shop_id.map(|id| id.to_string()),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List ledger history, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    state
        .store
        .get_user(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("account not registered".into()))?;

    // Fetch one more than requested to determine has_more.
    let limit = query.limit.min(100);
    let transactions = state
        .store
        .list_transactions(&auth.user_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Admin top-up request.
#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    /// User to credit.
    pub user_id: String,
    /// Amount of credits to add.
    pub amount: i64,
    /// Free-form reason for the audit trail.
    pub reason: String,
}

/// Admin endpoint to add credits (top-up).
pub async fn admin_add_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AddCreditsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid user id".into()))?;

    let balance = state
        .store
        .credit(&user_id, body.amount, TransactionReason::Topup, None)?;

    let _ = state.store.append_audit(&AuditRecord::new(
        "ledger.topup",
        "user",
        user_id.to_string(),
        admin.admin_id.clone(),
        serde_json::json!({ "amount": body.amount, "reason": body.reason }),
    ));

    tracing::info!(
        user_id = %user_id,
        amount = %body.amount,
        admin = %admin.admin_id,
        new_balance = %balance,
        "credits added"
    );

    Ok(Json(serde_json::json!({ "credits": balance })))
}
