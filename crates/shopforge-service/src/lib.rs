//! Shopforge service: HTTP API and provisioning engine.
//!
//! The service layers, outside in:
//!
//! - **Façade** (`handlers`, `routes`): validates, bills, persists, and
//!   enqueues; the synchronous path returns `202 Accepted` and never waits
//!   for provisioning.
//! - **Queue & workers** (`queue`): durable jobs, bounded concurrency,
//!   bounded retries with exponential backoff.
//! - **Monitor** (`monitor`): one supervising task per in-flight
//!   deployment, registered through a persisted lease; polls the workflow
//!   run, verifies health, commits the terminal state.
//! - **Providers** (`providers`): thin HTTP clients for the compute
//!   platform, the workflow provider, and the chatbot backend, injected as
//!   trait objects.
//! - **Cleanup** (`cleanup`): hard-delete sweep for soft-deleted shops
//!   past their grace period.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod notify;
pub mod providers;
pub mod queue;
pub mod routes;
pub mod sso;
pub mod state;

pub use cleanup::{CleanupReport, CleanupService};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use monitor::{DeploymentMonitor, MonitorConfig};
pub use queue::{JobQueue, WorkerContext, WorkerPool, WorkerSettings};
pub use routes::create_router;
pub use state::{AppState, Providers};
