//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Credit ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: ledger entries by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Shop records, keyed by `shop_id`.
    pub const SHOPS: &str = "shops";

    /// Index: shop id by slug. Enforces slug uniqueness.
    pub const SHOPS_BY_SLUG: &str = "shops_by_slug";

    /// Index: shop id by platform app name.
    pub const SHOPS_BY_APP: &str = "shops_by_app";

    /// Deployment records, keyed by `deployment_id`.
    pub const DEPLOYMENTS: &str = "deployments";

    /// Index: deployments by shop, keyed by
    /// `shop_id || created_at_millis || deployment_id`.
    pub const DEPLOYMENTS_BY_SHOP: &str = "deployments_by_shop";

    /// Shop secret material, keyed by `shop_id`.
    pub const SHOP_SECRETS: &str = "shop_secrets";

    /// Feature subscriptions, keyed by `shop_id || feature`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Append-only audit log, keyed by ULID.
    pub const AUDIT_LOG: &str = "audit_log";

    /// Durable provisioning jobs, keyed by `job_id`.
    pub const JOBS: &str = "jobs";

    /// Monitor supervision leases, keyed by `deployment_id`.
    pub const MONITOR_LEASES: &str = "monitor_leases";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::SHOPS,
        cf::SHOPS_BY_SLUG,
        cf::SHOPS_BY_APP,
        cf::DEPLOYMENTS,
        cf::DEPLOYMENTS_BY_SHOP,
        cf::SHOP_SECRETS,
        cf::SUBSCRIPTIONS,
        cf::AUDIT_LOG,
        cf::JOBS,
        cf::MONITOR_LEASES,
    ]
}
