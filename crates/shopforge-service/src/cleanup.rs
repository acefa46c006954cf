//! Hard-delete cleanup for soft-deleted shops.
//!
//! Scans shops whose grace period has elapsed, tears down the remote app
//! best-effort, and removes the rows. The remote teardown logs and
//! continues on failure — the app may already be gone.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use shopforge_core::{AuditRecord, Shop, ShopId, ShopStatus};
use shopforge_store::{Store, StoreError};

use crate::providers::ComputeProvider;

/// Error type for cleanup operations.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// Storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The shop is not soft-deleted.
    #[error("shop is not deleted: {shop_id}")]
    NotDeleted {
        /// The shop that was not eligible.
        shop_id: String,
    },
}

/// Outcome of one cleanup sweep.
#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    /// Shops whose grace period had elapsed.
    pub scanned: usize,

    /// Shops hard-deleted.
    pub deleted: usize,

    /// Remote teardowns that failed (deletion proceeded anyway).
    pub remote_failures: usize,
}

/// Performs destructive cleanup of soft-deleted shops.
pub struct CleanupService {
    store: Arc<dyn Store>,
    compute: Option<Arc<dyn ComputeProvider>>,
}

impl CleanupService {
    /// Create a cleanup service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, compute: Option<Arc<dyn ComputeProvider>>) -> Self {
        Self { store, compute }
    }

    /// List shops due for hard deletion as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Shop>, StoreError> {
        self.store.list_hard_delete_due(now)
    }

    /// Hard-delete one shop: best-effort remote teardown, then cascading
    /// row deletion. Only soft-deleted shops are eligible.
    ///
    /// Returns `true` when the remote teardown succeeded (or the app was
    /// already gone), `false` when it failed and deletion proceeded anyway.
    ///
    /// # Errors
    ///
    /// - `CleanupError::NotDeleted` if the shop is not soft-deleted.
    /// - `CleanupError::Store` if a database operation fails.
    pub async fn hard_delete(&self, shop_id: &ShopId) -> Result<bool, CleanupError> {
        let shop = self
            .store
            .get_shop(shop_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "shop",
                id: shop_id.to_string(),
            })?;

        if shop.status != ShopStatus::Deleted {
            return Err(CleanupError::NotDeleted {
                shop_id: shop_id.to_string(),
            });
        }

        let mut remote_ok = true;
        if let Some(compute) = &self.compute {
            match compute.destroy_app(&shop.app_name).await {
                Ok(destroyed) => {
                    info!(
                        shop_id = %shop.id,
                        app_name = %shop.app_name,
                        destroyed = %destroyed,
                        "remote app teardown"
                    );
                }
                Err(e) => {
                    // The app may already be gone; deletion proceeds.
                    remote_ok = false;
                    warn!(
                        shop_id = %shop.id,
                        app_name = %shop.app_name,
                        error = %e,
                        "remote app teardown failed; continuing with record deletion"
                    );
                }
            }
        }

        self.store.delete_shop_cascade(shop_id)?;

        let _ = self.store.append_audit(&AuditRecord::new(
            "shop.hard_delete",
            "shop",
            shop_id.to_string(),
            "cleanup",
            serde_json::json!({
                "app_name": shop.app_name,
                "remote_teardown_ok": remote_ok,
            }),
        ));

        info!(shop_id = %shop_id, "shop hard-deleted");
        Ok(remote_ok)
    }

    /// Run one sweep over all due shops.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial scan fails; per-shop failures
    /// are logged and counted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<CleanupReport, StoreError> {
        let due = self.list_due(now)?;
        let mut report = CleanupReport {
            scanned: due.len(),
            ..CleanupReport::default()
        };

        for shop in due {
            match self.hard_delete(&shop.id).await {
                Ok(remote_ok) => {
                    report.deleted += 1;
                    if !remote_ok {
                        report.remote_failures += 1;
                    }
                }
                Err(e) => {
                    warn!(shop_id = %shop.id, error = %e, "hard delete failed");
                }
            }
        }

        Ok(report)
    }
}
