//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use chrono::{DateTime, Utc};

use shopforge_core::{DeploymentId, Feature, JobId, ShopId, TransactionId, UserId};

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a user's ledger entries sort by time.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all ledger entries for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the transaction ID from a user-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a shop key from a shop ID.
#[must_use]
pub fn shop_key(shop_id: &ShopId) -> Vec<u8> {
    shop_id.as_bytes().to_vec()
}

/// Create a slug index key.
#[must_use]
pub fn slug_key(slug: &str) -> Vec<u8> {
    slug.as_bytes().to_vec()
}

/// Create an app-name index key.
#[must_use]
pub fn app_name_key(app_name: &str) -> Vec<u8> {
    app_name.as_bytes().to_vec()
}

/// Create a deployment key from a deployment ID.
#[must_use]
pub fn deployment_key(deployment_id: &DeploymentId) -> Vec<u8> {
    deployment_id.as_bytes().to_vec()
}

/// Create a shop-deployment index key.
///
/// Format: `shop_id (16) || created_at_millis (8, big-endian) ||
/// deployment_id (16)`, so a shop's deployments sort by creation time.
#[must_use]
pub fn shop_deployment_key(
    shop_id: &ShopId,
    created_at: DateTime<Utc>,
    deployment_id: &DeploymentId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(shop_id.as_bytes());
    key.extend_from_slice(&created_at.timestamp_millis().to_be_bytes());
    key.extend_from_slice(deployment_id.as_bytes());
    key
}

/// Create a prefix for iterating a shop's deployments.
#[must_use]
pub fn shop_deployments_prefix(shop_id: &ShopId) -> Vec<u8> {
    shop_id.as_bytes().to_vec()
}

/// Extract the deployment ID from a shop-deployment index key.
///
/// # Panics
///
/// Panics if the key is not at least 40 bytes.
#[must_use]
pub fn extract_deployment_id_from_shop_key(key: &[u8]) -> DeploymentId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[24..40]);
    DeploymentId::from_bytes(bytes)
}

/// Create a subscription key.
///
/// Format: `shop_id (16) || feature key bytes`.
#[must_use]
pub fn subscription_key(shop_id: &ShopId, feature: Feature) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + feature.key().len());
    key.extend_from_slice(shop_id.as_bytes());
    key.extend_from_slice(feature.key().as_bytes());
    key
}

/// Create a prefix for iterating a shop's subscriptions.
#[must_use]
pub fn subscriptions_prefix(shop_id: &ShopId) -> Vec<u8> {
    shop_id.as_bytes().to_vec()
}

/// Create a fresh time-ordered audit log key.
#[must_use]
pub fn audit_key() -> Vec<u8> {
    ulid::Ulid::new().to_bytes().to_vec()
}

/// Create a job key from a job ID.
#[must_use]
pub fn job_key(job_id: &JobId) -> Vec<u8> {
    job_id.as_bytes().to_vec()
}

/// Create a monitor lease key from a deployment ID.
#[must_use]
pub fn lease_key(deployment_id: &DeploymentId) -> Vec<u8> {
    deployment_id.as_bytes().to_vec()
}
