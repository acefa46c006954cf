//! Shop (tenant) types for shopforge.
//!
//! A shop is one tenant's provisioned application instance on the remote
//! compute platform. The slug and the derived platform app name are
//! globally unique.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::user::HARD_DELETE_GRACE_DAYS;
use crate::{ShopId, UserId};

/// Prefix for platform app names derived from shop slugs.
pub const APP_NAME_PREFIX: &str = "sf";

/// A tenant's provisioned shop instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    /// The shop ID.
    pub id: ShopId,

    /// Owning user.
    pub owner_id: UserId,

    /// Display name as entered by the owner.
    pub shop_name: String,

    /// Globally-unique URL slug derived from the name.
    pub slug: String,

    /// Globally-unique compute platform identifier derived from the slug.
    pub app_name: String,

    /// Optional custom domain; when set it overrides the platform URL.
    pub custom_domain: Option<String>,

    /// Current lifecycle status.
    pub status: ShopStatus,

    /// Billing plan.
    pub plan: Plan,

    /// Plan resource limits.
    pub limits: ShopLimits,

    /// When the shop's plan period expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether the chatbot add-on is enabled.
    pub chatbot_enabled: bool,

    /// Bot identifier assigned by the chatbot backend.
    pub chatbot_bot_id: Option<String>,

    /// When the chatbot add-on was enabled.
    pub chatbot_enabled_at: Option<DateTime<Utc>>,

    /// When the shop was soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,

    /// When the shop becomes eligible for hard deletion.
    pub scheduled_hard_delete_at: Option<DateTime<Utc>>,

    /// When the shop was created.
    pub created_at: DateTime<Utc>,

    /// When the shop was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    /// Create a new shop in `Creating` status.
    #[must_use]
    pub fn new(owner_id: UserId, shop_name: impl Into<String>, plan: Plan) -> Self {
        let shop_name = shop_name.into();
        let slug = slugify(&shop_name);
        let app_name = app_name_for_slug(&slug);
        let now = Utc::now();
        Self {
            id: ShopId::generate(),
            owner_id,
            shop_name,
            slug,
            app_name,
            custom_domain: None,
            status: ShopStatus::Creating,
            limits: plan.limits(),
            plan,
            expires_at: None,
            chatbot_enabled: false,
            chatbot_bot_id: None,
            chatbot_enabled_at: None,
            deleted_at: None,
            scheduled_hard_delete_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The public base URL of the shop.
    ///
    /// Custom domains take precedence over the platform domain.
    #[must_use]
    pub fn base_url(&self, platform_domain: &str) -> String {
        match &self.custom_domain {
            Some(domain) => format!("https://{domain}"),
            None => format!("https://{}.{platform_domain}", self.app_name),
        }
    }

    /// Mark the shop soft-deleted and schedule the hard delete.
    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.status = ShopStatus::Deleted;
        self.deleted_at = Some(now);
        self.scheduled_hard_delete_at = Some(now + Duration::days(HARD_DELETE_GRACE_DAYS));
        self.updated_at = now;
    }

    /// Whether the hard-delete grace period has elapsed.
    #[must_use]
    pub fn hard_delete_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ShopStatus::Deleted
            && self
                .scheduled_hard_delete_at
                .is_some_and(|due| due <= now)
    }
}

/// Lifecycle status of a shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopStatus {
    /// Provisioning is in progress.
    Creating,

    /// Deployed and healthy.
    Active,

    /// Provisioning failed; the shop must be deleted and recreated.
    Failed,

    /// Suspended by an operator.
    Suspended,

    /// Soft-deleted, awaiting hard delete.
    Deleted,
}

/// Billing plans for shops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Entry plan.
    Starter,

    /// Higher limits.
    Business,
}

impl Plan {
    /// Resource limits for this plan.
    #[must_use]
    pub const fn limits(&self) -> ShopLimits {
        match self {
            Self::Starter => ShopLimits {
                max_products: 100,
                max_orders_per_month: 1_000,
                max_storage_mb: 512,
            },
            Self::Business => ShopLimits {
                max_products: 10_000,
                max_orders_per_month: 50_000,
                max_storage_mb: 10_240,
            },
        }
    }
}

/// Per-plan resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopLimits {
    /// Maximum number of products.
    pub max_products: u32,

    /// Maximum orders per month.
    pub max_orders_per_month: u32,

    /// Maximum object storage in megabytes.
    pub max_storage_mb: u32,
}

/// Normalize a shop name into a URL slug.
///
/// Lowercases, maps runs of non-alphanumeric characters to single hyphens,
/// and trims leading/trailing hyphens. Two names that normalize to the same
/// slug collide.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true; // suppress leading hyphen
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Derive the platform app name from a slug.
#[must_use]
pub fn app_name_for_slug(slug: &str) -> String {
    format!("{APP_NAME_PREFIX}-{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("Acme Store!"), "acme-store");
        assert_eq!(slugify("  --Acme__Store--  "), "acme-store");
        assert_eq!(slugify("Shop 2000"), "shop-2000");
    }

    #[test]
    fn colliding_names_share_a_slug() {
        assert_eq!(slugify("Acme Store"), slugify("acme   store"));
    }

    #[test]
    fn app_name_derivation() {
        assert_eq!(app_name_for_slug("acme"), "sf-acme");
    }

    #[test]
    fn new_shop_is_creating() {
        let shop = Shop::new(UserId::generate(), "Acme Store", Plan::Starter);
        assert_eq!(shop.status, ShopStatus::Creating);
        assert_eq!(shop.slug, "acme-store");
        assert_eq!(shop.app_name, "sf-acme-store");
        assert_eq!(shop.limits, Plan::Starter.limits());
    }

    #[test]
    fn base_url_prefers_custom_domain() {
        let mut shop = Shop::new(UserId::generate(), "Acme", Plan::Starter);
        assert_eq!(shop.base_url("shops.example.dev"), "https://sf-acme.shops.example.dev");

        shop.custom_domain = Some("shop.acme.com".into());
        assert_eq!(shop.base_url("shops.example.dev"), "https://shop.acme.com");
    }

    #[test]
    fn soft_delete_schedules_hard_delete() {
        let mut shop = Shop::new(UserId::generate(), "Acme", Plan::Starter);
        shop.soft_delete();

        assert_eq!(shop.status, ShopStatus::Deleted);
        let due = shop.scheduled_hard_delete_at.unwrap();
        assert!(due > Utc::now() + Duration::days(6));
        assert!(!shop.hard_delete_due(Utc::now()));
        assert!(shop.hard_delete_due(Utc::now() + Duration::days(8)));
    }
}
