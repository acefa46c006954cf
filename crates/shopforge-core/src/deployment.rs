//! Deployment types for shopforge.
//!
//! A deployment is one provisioning attempt for a shop. A shop may
//! accumulate many deployments over its life; the most recent one is
//! authoritative for current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeploymentId, ShopId};

/// One provisioning attempt for a shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// The deployment ID.
    pub id: DeploymentId,

    /// The shop being provisioned.
    pub shop_id: ShopId,

    /// Current status.
    pub status: DeploymentStatus,

    /// Workflow provider run identifier, once dispatched.
    pub external_run_id: Option<String>,

    /// Structured step events, append-only.
    pub events: Vec<DeploymentEvent>,

    /// Terminal error message, if the deployment failed.
    pub error_message: Option<String>,

    /// When the worker picked the job up.
    pub started_at: Option<DateTime<Utc>>,

    /// When the deployment reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the deployment record was created.
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Create a new queued deployment for a shop.
    #[must_use]
    pub fn new(shop_id: ShopId) -> Self {
        Self {
            id: DeploymentId::generate(),
            shop_id,
            status: DeploymentStatus::Queued,
            external_run_id: None,
            events: Vec::new(),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Append a step event.
    pub fn push_event(&mut self, event: DeploymentEvent) {
        self.events.push(event);
    }

    /// Whether the deployment has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Status of a deployment.
///
/// Transitions are monotonic: `Queued → Running → {Success, Failed}`.
/// No writer may move a deployment backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Waiting for a worker.
    Queued,

    /// Workflow dispatched, monitor attached.
    Running,

    /// Workflow succeeded and the app verified healthy.
    Success,

    /// Workflow failed, timed out, or the app never became healthy.
    Failed,
}

impl DeploymentStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether a transition to `next` is allowed by the state machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running | Self::Failed)
                | (Self::Running, Self::Success | Self::Failed)
        )
    }
}

/// A structured deployment step event.
///
/// A closed set of variants rather than a free-form log blob, so persisted
/// histories stay queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeploymentEvent {
    /// The remote workflow was dispatched.
    Dispatched {
        /// Provider run identifier.
        run_id: String,
        /// Dispatch attempt number (1-based).
        attempt: u32,
        /// When the dispatch happened.
        at: DateTime<Utc>,
    },

    /// The workflow run changed status.
    WorkflowStatus {
        /// Observed provider status string.
        status: String,
        /// When the change was observed.
        at: DateTime<Utc>,
    },

    /// One health-verification attempt completed.
    HealthCheckAttempt {
        /// Attempt number (1-based).
        attempt: u32,
        /// Whether the app was healthy.
        healthy: bool,
        /// Probe detail (status code or error).
        detail: String,
        /// When the attempt finished.
        at: DateTime<Utc>,
    },

    /// Terminal outcome committed.
    Terminal {
        /// Final status.
        outcome: DeploymentStatus,
        /// Terminal message.
        message: String,
        /// When the outcome was committed.
        at: DateTime<Utc>,
    },
}
