//! Error types for shopforge storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. `user`, `shop`.
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// Insufficient credits for a debit.
    #[error("insufficient credits: have={have}, need={need}")]
    InsufficientCredits {
        /// Current balance.
        have: i64,
        /// Required amount.
        need: i64,
    },

    /// Slug or app name already taken by another shop.
    #[error("slug already taken: {slug}")]
    SlugTaken {
        /// The colliding slug.
        slug: String,
    },

    /// Rejected backward deployment status transition.
    #[error("invalid deployment transition: {from} -> {to}")]
    InvalidTransition {
        /// Current persisted status.
        from: String,
        /// Attempted status.
        to: String,
    },

    /// Debit/credit amount must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}
