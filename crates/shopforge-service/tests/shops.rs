//! Integration tests for the shop façade: creation, billing, soft delete,
//! SSO, and the deployment webhook.

mod common;

use common::TestHarness;

use shopforge_core::{
    DeploymentStatus, ShopStatus, TransactionReason, UserId, SHOP_CREATION_COST,
};
use shopforge_store::Store;

fn create_shop_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "shop_name": name,
        "admin_email": "admin@example.com",
        "admin_password": "hunter2hunter2",
    })
}

#[tokio::test]
async fn create_shop_is_accepted_and_persists_records() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme Store"))
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["slug"], "acme-store");
    assert_eq!(body["app_name"], "sf-acme-store");
    assert_eq!(body["status"], "queued");

    // Shop persisted in `creating`, deployment in `queued`.
    let shop_id = body["shop_id"].as_str().unwrap().parse().unwrap();
    let shop = harness.state.store.get_shop(&shop_id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Creating);

    let deployment = harness
        .state
        .store
        .latest_deployment_for_shop(&shop_id)
        .unwrap()
        .unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Queued);
    assert_eq!(deployment.id.to_string(), body["deployment_id"]);

    // A durable job exists for the worker.
    let jobs = harness.state.store.list_unfinished_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].shop_id, shop_id);
}

#[tokio::test]
async fn first_shop_is_free_then_fixed_cost_then_402() {
    let harness = TestHarness::new();
    harness.seed_default_user(1000);

    // First shop: free grant, no debit.
    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme"))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    let user = harness
        .state
        .store
        .get_user(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(user.credits, 1000);
    assert!(user.first_shop_redeemed);

    // Second shop: fixed debit down to zero, ledger row carries the
    // resulting balance.
    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme2"))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    let user = harness
        .state
        .store
        .get_user(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(user.credits, 0);

    let txs = harness
        .state
        .store
        .list_transactions(&harness.test_user_id, 10, 0)
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, -SHOP_CREATION_COST);
    assert_eq!(txs[0].balance_after, 0);
    assert_eq!(txs[0].reason, TransactionReason::ShopCreation);

    // Third shop: 402 with required/available amounts, no side effects.
    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme3"))
        .await;
    response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["need"], 1000);
    assert_eq!(body["error"]["details"]["have"], 0);

    assert!(harness
        .state
        .store
        .get_shop_by_slug("acme3")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn colliding_slugs_conflict() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme Store"))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    // Same normalized slug from a different user.
    let other = UserId::generate();
    harness.seed_user(other, 5000);
    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", TestHarness::auth_header_for(other))
        .json(&create_shop_body("acme   STORE"))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn validation_fails_fast_without_side_effects() {
    let harness = TestHarness::new();
    harness.seed_default_user(1000);

    for body in [
        serde_json::json!({"shop_name": "!!!", "admin_email": "a@b.c", "admin_password": "hunter2hunter2"}),
        serde_json::json!({"shop_name": "Acme", "admin_email": "not-an-email", "admin_password": "hunter2hunter2"}),
        serde_json::json!({"shop_name": "Acme", "admin_email": "a@b.c", "admin_password": "short"}),
    ] {
        let response = harness
            .server
            .post("/v1/shops")
            .add_header("authorization", harness.user_auth_header())
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    let user = harness
        .state
        .store
        .get_user(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(user.credits, 1000);
    assert!(!user.first_shop_redeemed);
}

#[tokio::test]
async fn requests_without_auth_are_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/shops")
        .json(&create_shop_body("Acme"))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn queue_unavailable_refunds_and_marks_failed() {
    let mut harness = TestHarness::new();
    harness.seed_default_user(2000);

    // Consume the free grant first so the next creation debits.
    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("First"))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    // Close the dispatch channel: the durable write still works, but the
    // handoff fails and the façade must compensate.
    harness.job_rx.take();

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Paid Shop"))
        .await;
    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);

    // Debit was compensated; the ledger shows both entries.
    let user = harness
        .state
        .store
        .get_user(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(user.credits, 2000);

    let txs = harness
        .state
        .store
        .list_transactions(&harness.test_user_id, 10, 0)
        .unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].reason, TransactionReason::Refund);
    assert_eq!(txs[1].reason, TransactionReason::ShopCreation);

    // Explicit failed state, not a silent pending shop.
    let shop = harness
        .state
        .store
        .get_shop_by_slug("paid-shop")
        .unwrap()
        .unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);
    let deployment = harness
        .state
        .store
        .latest_deployment_for_shop(&shop.id)
        .unwrap()
        .unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert!(deployment
        .error_message
        .unwrap()
        .contains("queue unavailable"));
}

#[tokio::test]
async fn soft_delete_schedules_hard_delete_and_checks_ownership() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme"))
        .await;
    let shop_id = response.json::<serde_json::Value>()["shop_id"]
        .as_str()
        .unwrap()
        .to_string();

    // A different user may not delete it.
    let other = UserId::generate();
    harness.seed_user(other, 0);
    let response = harness
        .server
        .delete(&format!("/v1/shops/{shop_id}"))
        .add_header("authorization", TestHarness::auth_header_for(other))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);

    // The owner can; the grace period is scheduled.
    let response = harness
        .server
        .delete(&format!("/v1/shops/{shop_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "deleted");
    assert!(body["scheduled_hard_delete_at"].is_string());

    let shop = harness
        .state
        .store
        .get_shop(&shop_id.parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(shop.status, ShopStatus::Deleted);
    assert!(shop.deleted_at.is_some());

    // Idempotent: deleting again keeps the original schedule.
    let response = harness
        .server
        .delete(&format!("/v1/shops/{shop_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn sso_token_validates_against_stored_secret() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme"))
        .await;
    let shop_id: shopforge_core::ShopId = response.json::<serde_json::Value>()["shop_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let response = harness
        .server
        .post(&format!("/v1/shops/{shop_id}/sso-token"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let token = body["token"].as_str().unwrap();
    assert_eq!(body["expires_in"], 3600);

    let secret = harness
        .state
        .store
        .get_shop_secret(&shop_id)
        .unwrap()
        .unwrap();

    let mut validation = jsonwebtoken::Validation::default();
    validation.set_issuer(&["shopforge"]);
    validation.validate_aud = false;
    let data = jsonwebtoken::decode::<serde_json::Value>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.sso_secret.as_bytes()),
        &validation,
    )
    .unwrap();
    assert_eq!(data.claims["sub"], shop_id.to_string());
    assert_eq!(data.claims["role"], "owner");
}

#[tokio::test]
async fn deployment_webhook_authenticates_and_commits() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme"))
        .await;
    let body: serde_json::Value = response.json();
    let shop_id: shopforge_core::ShopId = body["shop_id"].as_str().unwrap().parse().unwrap();
    let app_name = body["app_name"].as_str().unwrap().to_string();

    // Generating the SSO token materializes the shop's secret material.
    harness
        .server
        .post(&format!("/v1/shops/{shop_id}/sso-token"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();
    let secret = harness
        .state
        .store
        .get_shop_secret(&shop_id)
        .unwrap()
        .unwrap();

    // Wrong bearer token is rejected.
    let response = harness
        .server
        .post("/api/webhooks/deployment")
        .add_header("authorization", "Bearer wrong-secret")
        .json(&serde_json::json!({
            "app_name": app_name,
            "status": "failed",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    // Correct token commits the terminal state through the monitor path.
    let response = harness
        .server
        .post("/api/webhooks/deployment")
        .add_header(
            "authorization",
            format!("Bearer {}", secret.webhook_secret),
        )
        .json(&serde_json::json!({
            "app_name": app_name,
            "status": "failed",
            "message": "pipeline reported failure",
        }))
        .await;
    response.assert_status_ok();

    let deployment = harness
        .state
        .store
        .latest_deployment_for_shop(&shop_id)
        .unwrap()
        .unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert_eq!(
        deployment.error_message.as_deref(),
        Some("pipeline reported failure")
    );

    let shop = harness.state.store.get_shop(&shop_id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);

    // A second, contradictory report cannot move the terminal state.
    let response = harness
        .server
        .post("/api/webhooks/deployment")
        .add_header(
            "authorization",
            format!("Bearer {}", secret.webhook_secret),
        )
        .json(&serde_json::json!({
            "app_name": app_name,
            "status": "success",
        }))
        .await;
    response.assert_status_ok();
    let deployment = harness
        .state
        .store
        .latest_deployment_for_shop(&shop_id)
        .unwrap()
        .unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn shop_detail_reflects_latest_deployment() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let response = harness
        .server
        .post("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .json(&create_shop_body("Acme"))
        .await;
    let shop_id = response.json::<serde_json::Value>()["shop_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = harness
        .server
        .get(&format!("/v1/shops/{shop_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "creating");
    assert_eq!(body["deployment"]["status"], "queued");

    let response = harness
        .server
        .get("/v1/shops")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["shops"].as_array().unwrap().len(), 1);
}
