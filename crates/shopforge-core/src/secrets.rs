//! Per-shop secret material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ShopId;

/// Secret material for a shop, generated once at first use.
///
/// The SSO secret signs short-lived cross-service tokens; the webhook
/// secret authenticates inbound deployment callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSecret {
    /// The shop these secrets belong to.
    pub shop_id: ShopId,

    /// HS256 signing secret for cross-service SSO tokens.
    pub sso_secret: String,

    /// Bearer secret for inbound webhook callbacks.
    pub webhook_secret: String,

    /// When the secrets were generated.
    pub created_at: DateTime<Utc>,
}

impl ShopSecret {
    /// Create a secret record from freshly generated material.
    #[must_use]
    pub fn new(shop_id: ShopId, sso_secret: String, webhook_secret: String) -> Self {
        Self {
            shop_id,
            sso_secret,
            webhook_secret,
            created_at: Utc::now(),
        }
    }
}
