//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use shopforge_core::{
    AuditRecord, CreditTransaction, Deployment, DeploymentId, Feature, JobId, MonitorLease,
    ProvisionJob, Shop, ShopId, ShopSecret, Subscription, TransactionReason, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes compound read-check-write operations (ledger mutations,
    /// slug claims, deployment transitions, lease acquisition). RocksDB
    /// batches are atomic but do not lock between the read and the write;
    /// this lock closes that window.
    mutation_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "rocksdb store opened");

        Ok(Self {
            db: Arc::new(db),
            mutation_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.mutation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn get_cf_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_cf_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let data = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, data)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Shared ledger mutation: called with the mutation lock held.
    fn apply_ledger_entry(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
        is_debit: bool,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let mut user = self
            .get_user(user_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })?;

        if is_debit && user.credits < amount {
            return Err(StoreError::InsufficientCredits {
                have: user.credits,
                need: amount,
            });
        }

        user.credits = if is_debit {
            user.credits - amount
        } else {
            user.credits + amount
        };
        user.updated_at = Utc::now();

        let transaction = if is_debit {
            CreditTransaction::debit(*user_id, amount, reason, related_shop_id, user.credits)
        } else {
            CreditTransaction::credit(*user_id, amount, reason, related_shop_id, user.credits)
        };

        let cf_users = self.cf(cf::USERS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let user_value = Self::serialize(&user)?;
        let tx_value = Self::serialize(&transaction)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(user_id), &user_value);
        batch.put_cf(&cf_tx, keys::transaction_key(&transaction.id), &tx_value);
        batch.put_cf(
            &cf_tx_by_user,
            keys::user_transaction_key(user_id, &transaction.id),
            [],
        );
        self.write(batch)?;

        Ok(user.credits)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        self.put_cf_value(cf::USERS, &keys::user_key(&user.id), user)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get_cf_value(cf::USERS, &keys::user_key(user_id))
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn debit(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
    ) -> Result<i64> {
        let _guard = self.lock();
        self.apply_ledger_entry(user_id, amount, reason, related_shop_id, true)
    }

    fn credit(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
    ) -> Result<i64> {
        let _guard = self.lock();
        self.apply_ledger_entry(user_id, amount, reason, related_shop_id, false)
    }

    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULIDs are time-ordered, so the index iterates oldest first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        // Newest first.
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            if let Some(tx) =
                self.get_cf_value::<CreditTransaction>(cf::TRANSACTIONS, &keys::transaction_key(&tx_id))?
            {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Shop Operations
    // =========================================================================

    fn create_shop(&self, shop: &Shop) -> Result<()> {
        let _guard = self.lock();

        let cf_slug = self.cf(cf::SHOPS_BY_SLUG)?;
        let cf_app = self.cf(cf::SHOPS_BY_APP)?;

        let slug_taken = self
            .db
            .get_cf(&cf_slug, keys::slug_key(&shop.slug))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        let app_taken = self
            .db
            .get_cf(&cf_app, keys::app_name_key(&shop.app_name))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        if slug_taken || app_taken {
            return Err(StoreError::SlugTaken {
                slug: shop.slug.clone(),
            });
        }

        let cf_shops = self.cf(cf::SHOPS)?;
        let value = Self::serialize(shop)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_shops, keys::shop_key(&shop.id), &value);
        batch.put_cf(&cf_slug, keys::slug_key(&shop.slug), shop.id.as_bytes());
        batch.put_cf(&cf_app, keys::app_name_key(&shop.app_name), shop.id.as_bytes());
        self.write(batch)
    }

    fn put_shop(&self, shop: &Shop) -> Result<()> {
        if self.get_shop(&shop.id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "shop",
                id: shop.id.to_string(),
            });
        }
        self.put_cf_value(cf::SHOPS, &keys::shop_key(&shop.id), shop)
    }

    fn get_shop(&self, shop_id: &ShopId) -> Result<Option<Shop>> {
        self.get_cf_value(cf::SHOPS, &keys::shop_key(shop_id))
    }

    fn get_shop_by_slug(&self, slug: &str) -> Result<Option<Shop>> {
        let cf_slug = self.cf(cf::SHOPS_BY_SLUG)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf_slug, keys::slug_key(slug))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&id_bytes[..16]);
        self.get_shop(&ShopId::from_bytes(bytes))
    }

    fn get_shop_by_app_name(&self, app_name: &str) -> Result<Option<Shop>> {
        let cf_app = self.cf(cf::SHOPS_BY_APP)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf_app, keys::app_name_key(app_name))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&id_bytes[..16]);
        self.get_shop(&ShopId::from_bytes(bytes))
    }

    fn list_shops_by_owner(&self, owner_id: &UserId) -> Result<Vec<Shop>> {
        let cf_shops = self.cf(cf::SHOPS)?;
        let mut shops = Vec::new();

        for item in self.db.iterator_cf(&cf_shops, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let shop: Shop = Self::deserialize(&value)?;
            if shop.owner_id == *owner_id {
                shops.push(shop);
            }
        }

        shops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shops)
    }

    fn list_hard_delete_due(&self, now: DateTime<Utc>) -> Result<Vec<Shop>> {
        let cf_shops = self.cf(cf::SHOPS)?;
        let mut due = Vec::new();

        for item in self.db.iterator_cf(&cf_shops, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let shop: Shop = Self::deserialize(&value)?;
            if shop.hard_delete_due(now) {
                due.push(shop);
            }
        }

        Ok(due)
    }

    fn delete_shop_cascade(&self, shop_id: &ShopId) -> Result<()> {
        let shop = self.get_shop(shop_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "shop",
            id: shop_id.to_string(),
        })?;

        let cf_shops = self.cf(cf::SHOPS)?;
        let cf_slug = self.cf(cf::SHOPS_BY_SLUG)?;
        let cf_app = self.cf(cf::SHOPS_BY_APP)?;
        let cf_deps = self.cf(cf::DEPLOYMENTS)?;
        let cf_deps_by_shop = self.cf(cf::DEPLOYMENTS_BY_SHOP)?;
        let cf_secrets = self.cf(cf::SHOP_SECRETS)?;
        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_jobs = self.cf(cf::JOBS)?;
        let cf_leases = self.cf(cf::MONITOR_LEASES)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_shops, keys::shop_key(shop_id));
        batch.delete_cf(&cf_slug, keys::slug_key(&shop.slug));
        batch.delete_cf(&cf_app, keys::app_name_key(&shop.app_name));
        batch.delete_cf(&cf_secrets, keys::shop_key(shop_id));

        // Deployments and their index entries and leases.
        let prefix = keys::shop_deployments_prefix(shop_id);
        let iter = self.db.iterator_cf(
            &cf_deps_by_shop,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let dep_id = keys::extract_deployment_id_from_shop_key(&key);
            batch.delete_cf(&cf_deps, keys::deployment_key(&dep_id));
            batch.delete_cf(&cf_leases, keys::lease_key(&dep_id));
            batch.delete_cf(&cf_deps_by_shop, key);
        }

        // Subscriptions.
        let sub_prefix = keys::subscriptions_prefix(shop_id);
        let iter = self.db.iterator_cf(
            &cf_subs,
            IteratorMode::From(&sub_prefix, rocksdb::Direction::Forward),
        );
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&sub_prefix) {
                break;
            }
            batch.delete_cf(&cf_subs, key);
        }

        // Jobs referencing this shop.
        for item in self.db.iterator_cf(&cf_jobs, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let job: ProvisionJob = Self::deserialize(&value)?;
            if job.shop_id == *shop_id {
                batch.delete_cf(&cf_jobs, key);
            }
        }

        self.write(batch)
    }

    // =========================================================================
    // Deployment Operations
    // =========================================================================

    fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        let cf_deps = self.cf(cf::DEPLOYMENTS)?;
        let cf_index = self.cf(cf::DEPLOYMENTS_BY_SHOP)?;
        let value = Self::serialize(deployment)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_deps, keys::deployment_key(&deployment.id), &value);
        batch.put_cf(
            &cf_index,
            keys::shop_deployment_key(&deployment.shop_id, deployment.created_at, &deployment.id),
            [],
        );
        self.write(batch)
    }

    fn update_deployment(&self, deployment: &Deployment) -> Result<()> {
        let _guard = self.lock();

        let existing = self
            .get_deployment(&deployment.id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "deployment",
                id: deployment.id.to_string(),
            })?;

        if existing.status != deployment.status
            && !existing.status.can_transition_to(deployment.status)
        {
            return Err(StoreError::InvalidTransition {
                from: format!("{:?}", existing.status).to_lowercase(),
                to: format!("{:?}", deployment.status).to_lowercase(),
            });
        }

        self.put_cf_value(cf::DEPLOYMENTS, &keys::deployment_key(&deployment.id), deployment)
    }

    fn get_deployment(&self, deployment_id: &DeploymentId) -> Result<Option<Deployment>> {
        self.get_cf_value(cf::DEPLOYMENTS, &keys::deployment_key(deployment_id))
    }

    fn latest_deployment_for_shop(&self, shop_id: &ShopId) -> Result<Option<Deployment>> {
        let cf_index = self.cf(cf::DEPLOYMENTS_BY_SHOP)?;
        let prefix = keys::shop_deployments_prefix(shop_id);

        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut latest_key: Option<Vec<u8>> = None;
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            latest_key = Some(key.to_vec());
        }

        match latest_key {
            Some(key) => {
                let dep_id = keys::extract_deployment_id_from_shop_key(&key);
                self.get_deployment(&dep_id)
            }
            None => Ok(None),
        }
    }

    fn list_running_deployments(&self) -> Result<Vec<Deployment>> {
        let cf_deps = self.cf(cf::DEPLOYMENTS)?;
        let mut running = Vec::new();

        for item in self.db.iterator_cf(&cf_deps, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let deployment: Deployment = Self::deserialize(&value)?;
            if deployment.status == shopforge_core::DeploymentStatus::Running {
                running.push(deployment);
            }
        }

        Ok(running)
    }

    // =========================================================================
    // Secret / Subscription Operations
    // =========================================================================

    fn put_shop_secret(&self, secret: &ShopSecret) -> Result<()> {
        self.put_cf_value(cf::SHOP_SECRETS, &keys::shop_key(&secret.shop_id), secret)
    }

    fn get_shop_secret(&self, shop_id: &ShopId) -> Result<Option<ShopSecret>> {
        self.get_cf_value(cf::SHOP_SECRETS, &keys::shop_key(shop_id))
    }

    fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.put_cf_value(
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(&subscription.shop_id, subscription.feature),
            subscription,
        )
    }

    fn get_subscription(
        &self,
        shop_id: &ShopId,
        feature: Feature,
    ) -> Result<Option<Subscription>> {
        self.get_cf_value(cf::SUBSCRIPTIONS, &keys::subscription_key(shop_id, feature))
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.put_cf_value(cf::AUDIT_LOG, &keys::audit_key(), record)
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    fn put_job(&self, job: &ProvisionJob) -> Result<()> {
        self.put_cf_value(cf::JOBS, &keys::job_key(&job.id), job)
    }

    fn get_job(&self, job_id: &JobId) -> Result<Option<ProvisionJob>> {
        self.get_cf_value(cf::JOBS, &keys::job_key(job_id))
    }

    fn list_unfinished_jobs(&self) -> Result<Vec<ProvisionJob>> {
        let cf_jobs = self.cf(cf::JOBS)?;
        let mut jobs = Vec::new();

        for item in self.db.iterator_cf(&cf_jobs, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let job: ProvisionJob = Self::deserialize(&value)?;
            if job.status.is_unfinished() {
                jobs.push(job);
            }
        }

        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    // =========================================================================
    // Monitor Lease Operations
    // =========================================================================

    fn try_acquire_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<bool> {
        let _guard = self.lock();

        let now = Utc::now();
        let existing: Option<MonitorLease> =
            self.get_cf_value(cf::MONITOR_LEASES, &keys::lease_key(deployment_id))?;

        if let Some(lease) = &existing {
            if lease.owner != owner && !lease.is_stale(now) {
                return Ok(false);
            }
        }

        let mut lease = MonitorLease::new(*deployment_id, owner);
        if let Some(prev) = existing {
            if prev.owner == owner {
                lease.acquired_at = prev.acquired_at;
            }
        }
        self.put_cf_value(cf::MONITOR_LEASES, &keys::lease_key(deployment_id), &lease)?;
        Ok(true)
    }

    fn heartbeat_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<()> {
        let _guard = self.lock();

        let Some(mut lease) =
            self.get_cf_value::<MonitorLease>(cf::MONITOR_LEASES, &keys::lease_key(deployment_id))?
        else {
            return Ok(());
        };

        if lease.owner == owner {
            lease.heartbeat_at = Utc::now();
            self.put_cf_value(cf::MONITOR_LEASES, &keys::lease_key(deployment_id), &lease)?;
        }
        Ok(())
    }

    fn release_lease(&self, deployment_id: &DeploymentId, owner: &str) -> Result<()> {
        let _guard = self.lock();

        let existing: Option<MonitorLease> =
            self.get_cf_value(cf::MONITOR_LEASES, &keys::lease_key(deployment_id))?;

        if existing.is_some_and(|lease| lease.owner == owner) {
            let cf_leases = self.cf(cf::MONITOR_LEASES)?;
            self.db
                .delete_cf(&cf_leases, keys::lease_key(deployment_id))
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(())
    }

    fn get_lease(&self, deployment_id: &DeploymentId) -> Result<Option<MonitorLease>> {
        self.get_cf_value(cf::MONITOR_LEASES, &keys::lease_key(deployment_id))
    }
}
