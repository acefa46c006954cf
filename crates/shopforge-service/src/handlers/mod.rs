//! HTTP request handlers.

pub mod admin;
pub mod credits;
pub mod features;
pub mod health;
pub mod shops;
pub mod users;
pub mod webhooks;
