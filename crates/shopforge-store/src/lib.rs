//! `RocksDB` storage layer for shopforge.
//!
//! This crate provides persistent storage for users, the credit ledger,
//! shops, deployments, tenant secrets, subscriptions, the audit log,
//! provisioning jobs, and monitor leases, using `RocksDB` with column
//! families for efficient indexing.
//!
//! # Architecture
//!
//! Record column families are keyed by entity id; index column families
//! (`transactions_by_user`, `shops_by_slug`, `shops_by_app`,
//! `deployments_by_shop`) hold binary composite keys with empty values.
//! Compound operations (ledger debit/credit, shop creation, cascading
//! deletes) use `WriteBatch` so each commits atomically.
//!
//! Ledger balance mutations additionally serialize through an internal
//! lock: two concurrent debits against the same user can never both read
//! the same prior balance.
//!
//! # Example
//!
//! ```no_run
//! use shopforge_store::{RocksStore, Store};
//! use shopforge_core::{User, UserId, TransactionReason};
//!
//! let store = RocksStore::open("/tmp/shopforge-db").unwrap();
//!
//! let user = User::new(UserId::generate(), "owner@example.com");
//! store.put_user(&user).unwrap();
//! store.credit(&user.id, 1000, TransactionReason::Topup, None).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use shopforge_core::{
    AuditRecord, CreditTransaction, Deployment, DeploymentId, Feature, JobId, MonitorLease,
    ProvisionJob, Shop, ShopId, ShopSecret, Subscription, TransactionReason, User, UserId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g. `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Debit credits from a user atomically.
    ///
    /// Reads the balance, checks sufficiency, writes the new balance, and
    /// appends the ledger entry carrying the resulting balance — all in one
    /// atomic operation serialized against other balance mutations for the
    /// same store.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low;
    ///   no partial debit happens.
    /// - `StoreError::InvalidAmount` if `amount` is not positive.
    fn debit(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
    ) -> Result<i64>;

    /// Credit credits to a user atomically, appending the ledger entry.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InvalidAmount` if `amount` is not positive.
    fn credit(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
    ) -> Result<i64>;

    /// List ledger entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Shop Operations
    // =========================================================================

    /// Create a shop, claiming its slug and app name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SlugTaken` if another shop already holds the
    /// slug or app name.
    fn create_shop(&self, shop: &Shop) -> Result<()>;

    /// Update an existing shop record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the shop doesn't exist.
    fn put_shop(&self, shop: &Shop) -> Result<()>;

    /// Get a shop by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_shop(&self, shop_id: &ShopId) -> Result<Option<Shop>>;

    /// Get a shop by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_shop_by_slug(&self, slug: &str) -> Result<Option<Shop>>;

    /// Get a shop by platform app name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_shop_by_app_name(&self, app_name: &str) -> Result<Option<Shop>>;

    /// List shops owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_shops_by_owner(&self, owner_id: &UserId) -> Result<Vec<Shop>>;

    /// List soft-deleted shops whose hard-delete time has passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_hard_delete_due(&self, now: DateTime<Utc>) -> Result<Vec<Shop>>;

    /// Delete a shop row and everything it owns: deployments, secret
    /// material, subscriptions, jobs, and monitor leases. Ledger entries
    /// are immutable and stay.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the shop doesn't exist.
    fn delete_shop_cascade(&self, shop_id: &ShopId) -> Result<()>;

    // =========================================================================
    // Deployment Operations
    // =========================================================================

    /// Create a deployment record and its shop index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// Update a deployment, enforcing the monotonic state machine.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidTransition` if the persisted status
    /// cannot move to the new status (e.g. `success` back to `running`).
    fn update_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// Get a deployment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_deployment(&self, deployment_id: &DeploymentId) -> Result<Option<Deployment>>;

    /// Get the most recent deployment for a shop, which is authoritative
    /// for the shop's current provisioning state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_deployment_for_shop(&self, shop_id: &ShopId) -> Result<Option<Deployment>>;

    /// List deployments currently in `running` status, for resuming
    /// orphaned supervision after a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_running_deployments(&self) -> Result<Vec<Deployment>>;

    // =========================================================================
    // Secret / Subscription Operations
    // =========================================================================

    /// Store secret material for a shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_shop_secret(&self, secret: &ShopSecret) -> Result<()>;

    /// Get secret material for a shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_shop_secret(&self, shop_id: &ShopId) -> Result<Option<ShopSecret>>;

    /// Insert or update a feature subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Get a shop's subscription for a feature.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, shop_id: &ShopId, feature: Feature)
        -> Result<Option<Subscription>>;

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Append an audit record. Never read by business logic.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_audit(&self, record: &AuditRecord) -> Result<()>;

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert or update a provisioning job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_job(&self, job: &ProvisionJob) -> Result<()>;

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_job(&self, job_id: &JobId) -> Result<Option<ProvisionJob>>;

    /// List jobs that still need a worker (pending or running), for
    /// re-dispatch after a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_unfinished_jobs(&self) -> Result<Vec<ProvisionJob>>;

    // =========================================================================
    // Monitor Lease Operations
    // =========================================================================

    /// Try to acquire the supervision lease for a deployment.
    ///
    /// Returns `true` when acquired (or already held by this owner, or
    /// taken over from a stale owner) and `false` when another live owner
    /// holds it — the duplicate-registration no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn try_acquire_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<bool>;

    /// Refresh the heartbeat on a held lease. Ignored if the lease is no
    /// longer owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn heartbeat_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<()>;

    /// Release a held lease. Ignored if the lease is no longer owned by
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn release_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<()>;

    /// Get the lease for a deployment, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_lease(&self, deployment_id: &DeploymentId) -> Result<Option<MonitorLease>>;
}
