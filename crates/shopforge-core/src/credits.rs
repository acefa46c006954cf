//! Credit ledger types for shopforge.
//!
//! Every change to a user's balance creates an immutable ledger entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ShopId, TransactionId, UserId};

/// An immutable credit ledger entry.
///
/// Invariant: ordering a user's transactions by creation time, each
/// `balance_after` equals the prior `balance_after` plus this entry's
/// `amount`, and the latest `balance_after` equals the user's current
/// balance. Entries are created only inside a ledger operation that also
/// updates the balance, and are never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// Why the balance changed.
    pub reason: TransactionReason,

    /// The shop this entry relates to, if any.
    pub related_shop_id: Option<ShopId>,

    /// Balance after this transaction.
    pub balance_after: i64,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a debit entry. The amount is stored negated.
    #[must_use]
    pub fn debit(
        user_id: UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
        balance_after: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount: -amount.abs(),
            reason,
            related_shop_id,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a credit entry.
    #[must_use]
    pub fn credit(
        user_id: UserId,
        amount: i64,
        reason: TransactionReason,
        related_shop_id: Option<ShopId>,
        balance_after: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount: amount.abs(),
            reason,
            related_shop_id,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Reason for a credit ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    /// Credits granted at registration.
    InitialGrant,

    /// Debit for provisioning a shop.
    ShopCreation,

    /// Debit for enabling an add-on feature.
    FeatureEnablement,

    /// Compensating credit after a failed operation.
    Refund,

    /// Credits added by an operator or payment flow.
    Topup,
}

impl TransactionReason {
    /// Check if this reason adds credits (positive balance change).
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::InitialGrant | Self::Refund | Self::Topup)
    }

    /// Check if this reason removes credits (negative balance change).
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::ShopCreation | Self::FeatureEnablement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_is_negative() {
        let tx = CreditTransaction::debit(
            UserId::generate(),
            1000,
            TransactionReason::ShopCreation,
            Some(ShopId::generate()),
            0,
        );
        assert_eq!(tx.amount, -1000);
        assert_eq!(tx.balance_after, 0);
    }

    #[test]
    fn credit_is_positive() {
        let tx = CreditTransaction::credit(
            UserId::generate(),
            1000,
            TransactionReason::Refund,
            None,
            1000,
        );
        assert_eq!(tx.amount, 1000);
        assert_eq!(tx.reason, TransactionReason::Refund);
    }

    #[test]
    fn reason_credit_debit_split() {
        assert!(TransactionReason::InitialGrant.is_credit());
        assert!(TransactionReason::Refund.is_credit());
        assert!(TransactionReason::Topup.is_credit());
        assert!(!TransactionReason::ShopCreation.is_credit());

        assert!(TransactionReason::ShopCreation.is_debit());
        assert!(TransactionReason::FeatureEnablement.is_debit());
        assert!(!TransactionReason::Topup.is_debit());
    }

    #[test]
    fn reason_serde_snake_case() {
        let json = serde_json::to_string(&TransactionReason::FeatureEnablement).unwrap();
        assert_eq!(json, r#""feature_enablement""#);
    }
}
