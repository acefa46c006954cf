//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, credits, features, health, shops, users, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Users & Credits (bearer JWT auth)
/// - `POST /v1/users/register` - Create/fetch the caller's account
/// - `GET /v1/credits/balance` - Current balance
/// - `GET /v1/credits/transactions` - Ledger history
///
/// ## Shops (bearer JWT auth)
/// - `POST /v1/shops` - Create a shop (202; provisioning is async)
/// - `GET /v1/shops` - List own shops
/// - `GET /v1/shops/{id}` - Shop detail with latest deployment
/// - `DELETE /v1/shops/{id}` - Soft delete
/// - `POST /v1/shops/{id}/sso-token` - Mint a cross-service SSO token
/// - `POST /v1/shops/{id}/features/chatbot` - Enable the chatbot add-on
///
/// ## Admin (X-Admin-Key)
/// - `POST /v1/credits/add` - Top up a user's credits
/// - `POST /v1/admin/cleanup` - Run a hard-delete sweep
///
/// ## Webhooks (per-shop bearer secret)
/// - `POST /api/webhooks/deployment` - Deployment status callback
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Users & credits
        .route("/users/register", post(users::register))
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/add", post(credits::admin_add_credits))
        // Shops
        .route("/shops", post(shops::create_shop))
        .route("/shops", get(shops::list_shops))
        .route("/shops/:id", get(shops::get_shop))
        .route("/shops/:id", delete(shops::delete_shop))
        .route("/shops/:id/sso-token", post(shops::sso_token))
        .route("/shops/:id/features/chatbot", post(features::enable_chatbot))
        // Admin
        .route("/admin/cleanup", post(admin::run_cleanup))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the provisioning pipeline)
        .route("/api/webhooks/deployment", post(webhooks::deployment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
