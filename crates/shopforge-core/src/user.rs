//! User account types for shopforge.
//!
//! A user owns shops and pays for provisioning with a prepaid credit
//! balance. The balance is only ever mutated through ledger operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

// ============================================================================
// Constants
// ============================================================================

/// Cost of creating a shop, in credits.
pub const SHOP_CREATION_COST: i64 = 1000;

/// Cost of enabling the chatbot feature for a shop, in credits.
pub const CHATBOT_FEATURE_COST: i64 = 500;

/// Days between soft delete and hard delete of a shop.
pub const HARD_DELETE_GRACE_DAYS: i64 = 7;

/// A shopforge user.
///
/// Tracks the prepaid credit balance and whether the one-time free shop
/// grant has been consumed. User rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: UserId,

    /// Contact email.
    pub email: String,

    /// Current credit balance. Invariant: never negative.
    pub credits: i64,

    /// Whether the one-time free shop allowance has been used.
    pub first_shop_redeemed: bool,

    /// When the user was created.
    pub created_at: DateTime<Utc>,

    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with zero credits and an unused free grant.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            credits: 0,
            first_shop_redeemed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user has sufficient credits for a debit.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.credits >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_zero_credits() {
        let user = User::new(UserId::generate(), "owner@example.com");
        assert_eq!(user.credits, 0);
        assert!(!user.first_shop_redeemed);
    }

    #[test]
    fn sufficient_credits_boundary() {
        let mut user = User::new(UserId::generate(), "owner@example.com");
        user.credits = 1000;

        assert!(user.has_sufficient_credits(999));
        assert!(user.has_sufficient_credits(1000));
        assert!(!user.has_sufficient_credits(1001));
    }
}
