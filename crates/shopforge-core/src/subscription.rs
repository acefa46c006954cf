//! Per-shop feature subscriptions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ShopId;

/// Days a feature subscription runs before renewal.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// A feature grant for a shop.
///
/// Independent of shop status; created when a feature is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The shop the grant applies to.
    pub shop_id: ShopId,

    /// The granted feature.
    pub feature: Feature,

    /// Current status of the grant.
    pub status: SubscriptionStatus,

    /// When the current period expires.
    pub expires_at: DateTime<Utc>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Create an active subscription with a standard renewal period.
    #[must_use]
    pub fn activate(shop_id: ShopId, feature: Feature) -> Self {
        let now = Utc::now();
        Self {
            shop_id,
            feature,
            status: SubscriptionStatus::Active,
            expires_at: now + Duration::days(SUBSCRIPTION_PERIOD_DAYS),
            created_at: now,
        }
    }
}

/// Add-on features a shop can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// The chat assistant add-on.
    Chatbot,
}

impl Feature {
    /// Stable string key used in storage and API paths.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Chatbot => "chatbot",
        }
    }
}

/// Status of a feature subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// The grant is in effect.
    Active,

    /// The period lapsed without renewal.
    Expired,

    /// Cancelled by the owner or an operator.
    Cancelled,
}
