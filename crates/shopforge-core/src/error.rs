//! Error types for shopforge core operations.

use crate::ids::IdError;

/// Result type for shopforge core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in shopforge domain operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Insufficient credits for the operation.
    #[error("insufficient credits: have={have}, need={need}")]
    InsufficientCredits {
        /// Current balance.
        have: i64,
        /// Required amount.
        need: i64,
    },

    /// User not found.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// Shop not found.
    #[error("shop not found: {shop_id}")]
    ShopNotFound {
        /// The shop ID that was not found.
        shop_id: String,
    },

    /// Slug or app name already taken.
    #[error("slug already taken: {slug}")]
    SlugTaken {
        /// The colliding slug.
        slug: String,
    },

    /// Invalid deployment state transition.
    #[error("invalid deployment transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted status.
        to: String,
    },

    /// External service error.
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Invalid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}
