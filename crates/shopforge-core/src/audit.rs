//! Append-only audit records.
//!
//! Written for every state-changing operation; read only for forensics,
//! never by business logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// What happened, e.g. `shop.create`, `ledger.debit`.
    pub action: String,

    /// Kind of resource affected, e.g. `shop`, `deployment`.
    pub resource_type: String,

    /// Identifier of the affected resource.
    pub resource_id: String,

    /// Who performed the action (user id, `worker`, `monitor`, `system`).
    pub actor: String,

    /// Free-form context for forensics.
    pub details: serde_json::Value,

    /// When the action happened.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create an audit record stamped with the current time.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actor: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actor: actor.into(),
            details,
            created_at: Utc::now(),
        }
    }
}
