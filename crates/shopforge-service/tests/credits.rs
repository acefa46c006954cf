//! Integration tests for registration, balances, and the ledger API.

mod common;

use common::TestHarness;
use shopforge_store::Store;

#[tokio::test]
async fn register_is_idempotent() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users/register")
        .add_header("authorization", harness.user_auth_header())
        .json(&serde_json::json!({ "email": "owner@example.com" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 0);
    assert_eq!(body["first_shop_redeemed"], false);

    // Registering again returns the existing account.
    let response = harness
        .server
        .post("/v1/users/register")
        .add_header("authorization", harness.user_auth_header())
        .json(&serde_json::json!({ "email": "other@example.com" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.test_user_id.to_string());
}

#[tokio::test]
async fn admin_topup_requires_key_and_updates_balance() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    let body = serde_json::json!({
        "user_id": harness.test_user_id.to_string(),
        "amount": 2500,
        "reason": "manual top-up",
    });

    // No admin key: rejected.
    let response = harness.server.post("/v1/credits/add").json(&body).await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    // With the key: balance updates and a ledger entry appears.
    let response = harness
        .server
        .post("/v1/credits/add")
        .add_header("x-admin-key", harness.admin_key.clone())
        .json(&body)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 2500);

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 2500);
}

#[tokio::test]
async fn transactions_list_newest_first_with_pagination() {
    let harness = TestHarness::new();
    harness.seed_default_user(0);

    for amount in [100i64, 200, 300] {
        harness
            .state
            .store
            .credit(
                &harness.test_user_id,
                amount,
                shopforge_core::TransactionReason::Topup,
                None,
            )
            .unwrap();
        // ULIDs are time-ordered; keep the entries distinct.
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let response = harness
        .server
        .get("/v1/credits/transactions?limit=2")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let txs = body["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(body["has_more"], true);
    // Newest first.
    assert_eq!(txs[0]["amount"], 300);
    assert_eq!(txs[0]["balance_after"], 600);
    assert_eq!(txs[1]["amount"], 200);

    let response = harness
        .server
        .get("/v1/credits/transactions?limit=2&offset=2")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let txs = body["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["amount"], 100);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn balance_requires_registration() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}
