//! Core types and utilities for shopforge.
//!
//! This crate provides the foundational types used throughout the shopforge
//! platform:
//!
//! - **Identifiers**: `UserId`, `ShopId`, `DeploymentId`, `JobId`,
//!   `TransactionId`
//! - **Users & credits**: `User`, `CreditTransaction`, `TransactionReason`
//! - **Shops**: `Shop`, `ShopStatus`, `Plan`, `ShopLimits`
//! - **Deployments**: `Deployment`, `DeploymentStatus`, `DeploymentEvent`
//! - **Tenant bookkeeping**: `ShopSecret`, `Subscription`, `AuditRecord`
//!
//! # Credits
//!
//! Credits are stored as `i64` integers. Balances never go negative: every
//! mutation happens through a ledger operation that also appends an
//! immutable `CreditTransaction` carrying the resulting balance.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod credits;
pub mod deployment;
pub mod error;
pub mod ids;
pub mod job;
pub mod lease;
pub mod secrets;
pub mod shop;
pub mod subscription;
pub mod user;

pub use audit::AuditRecord;
pub use credits::{CreditTransaction, TransactionReason};
pub use deployment::{Deployment, DeploymentEvent, DeploymentStatus};
pub use error::{CoreError, Result};
pub use ids::{DeploymentId, IdError, JobId, ShopId, TransactionId, UserId};
pub use job::{
    backoff_secs, JobStatus, ProvisionJob, JOB_BACKOFF_BASE_SECS, JOB_MAX_ATTEMPTS,
};
pub use lease::{MonitorLease, LEASE_STALE_AFTER_SECS};
pub use secrets::ShopSecret;
pub use shop::{
    app_name_for_slug, slugify, Plan, Shop, ShopLimits, ShopStatus, APP_NAME_PREFIX,
};
pub use subscription::{
    Feature, Subscription, SubscriptionStatus, SUBSCRIPTION_PERIOD_DAYS,
};
pub use user::{
    User, CHATBOT_FEATURE_COST, HARD_DELETE_GRACE_DAYS, SHOP_CREATION_COST,
};
