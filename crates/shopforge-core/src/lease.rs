//! Persisted monitor supervision leases.
//!
//! A lease records which process is supervising an in-flight deployment.
//! Heartbeats keep it fresh; a stale lease can be taken over after a
//! restart so no deployment is left unsupervised.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::DeploymentId;

/// Seconds without a heartbeat before a lease is considered stale.
///
/// Three workflow poll intervals.
pub const LEASE_STALE_AFTER_SECS: i64 = 90;

/// A supervision lease for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorLease {
    /// The supervised deployment.
    pub deployment_id: DeploymentId,

    /// Identifier of the owning process.
    pub owner: String,

    /// When the lease was first acquired.
    pub acquired_at: DateTime<Utc>,

    /// Last heartbeat.
    pub heartbeat_at: DateTime<Utc>,
}

impl MonitorLease {
    /// Create a fresh lease owned by `owner`.
    #[must_use]
    pub fn new(deployment_id: DeploymentId, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            deployment_id,
            owner: owner.into(),
            acquired_at: now,
            heartbeat_at: now,
        }
    }

    /// Whether the lease has gone stale as of `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.heartbeat_at > Duration::seconds(LEASE_STALE_AFTER_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lease_is_not_stale() {
        let lease = MonitorLease::new(DeploymentId::generate(), "proc-1");
        assert!(!lease.is_stale(Utc::now()));
    }

    #[test]
    fn old_heartbeat_goes_stale() {
        let mut lease = MonitorLease::new(DeploymentId::generate(), "proc-1");
        lease.heartbeat_at = Utc::now() - Duration::seconds(LEASE_STALE_AFTER_SECS + 1);
        assert!(lease.is_stale(Utc::now()));
    }
}
