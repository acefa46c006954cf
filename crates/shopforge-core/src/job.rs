//! Durable provisioning job records.
//!
//! Jobs are persisted before they are dispatched to the worker pool, so a
//! restart can re-queue anything that had not finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeploymentId, JobId, ShopId, UserId};

/// Maximum dispatch attempts per job.
pub const JOB_MAX_ATTEMPTS: u32 = 3;

/// Base backoff between job attempts, in seconds. Doubles per attempt.
pub const JOB_BACKOFF_BASE_SECS: u64 = 10;

/// A durable `CreateShop` provisioning job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionJob {
    /// The job ID.
    pub id: JobId,

    /// The shop to provision.
    pub shop_id: ShopId,

    /// The deployment record tracking this attempt.
    pub deployment_id: DeploymentId,

    /// The paying user.
    pub user_id: UserId,

    /// Admin email for the provisioned instance.
    pub admin_email: String,

    /// Admin password handed to the provisioning workflow.
    pub admin_password: String,

    /// Current status.
    pub status: JobStatus,

    /// Dispatch attempts made so far.
    pub attempts: u32,

    /// Error captured from the last failed attempt.
    pub last_error: Option<String>,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ProvisionJob {
    /// Create a new pending job.
    #[must_use]
    pub fn new(
        shop_id: ShopId,
        deployment_id: DeploymentId,
        user_id: UserId,
        admin_email: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            shop_id,
            deployment_id,
            user_id,
            admin_email: admin_email.into(),
            admin_password: admin_password.into(),
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.attempts < JOB_MAX_ATTEMPTS
    }
}

/// Status of a provisioning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Enqueued, not yet picked up.
    Pending,

    /// A worker is executing attempts.
    Running,

    /// Dispatched successfully; the monitor owns the rest.
    Completed,

    /// All attempts exhausted.
    Failed,
}

impl JobStatus {
    /// Whether the job still needs a worker.
    #[must_use]
    pub const fn is_unfinished(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// Backoff delay after a failed attempt (1-based), in seconds.
///
/// Doubles per attempt: 10s after the first failure, then 20s, 40s, ...
#[must_use]
pub const fn backoff_secs(attempt: u32) -> u64 {
    if attempt == 0 {
        0
    } else {
        JOB_BACKOFF_BASE_SECS << (attempt - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending() {
        let job = ProvisionJob::new(
            ShopId::generate(),
            DeploymentId::generate(),
            UserId::generate(),
            "admin@example.com",
            "hunter2",
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.can_retry());
    }

    #[test]
    fn retry_bound() {
        let mut job = ProvisionJob::new(
            ShopId::generate(),
            DeploymentId::generate(),
            UserId::generate(),
            "a@b.c",
            "pw",
        );
        job.attempts = JOB_MAX_ATTEMPTS;
        assert!(!job.can_retry());
    }

    #[test]
    fn backoff_schedule() {
        assert_eq!(backoff_secs(1), 10);
        assert_eq!(backoff_secs(2), 20);
        assert_eq!(backoff_secs(3), 40);
    }
}
