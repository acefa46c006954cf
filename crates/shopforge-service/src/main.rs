//! Shopforge Service - shop provisioning and credit billing API.
//!
//! This is the main entry point for the shopforge service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopforge_service::{create_router, AppState, Providers, ServiceConfig};
use shopforge_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shopforge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Shopforge Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        platform_configured = %config.platform_api_url.is_some(),
        workflow_configured = %config.workflow_api_url.is_some(),
        chatbot_configured = %config.chatbot_api_url.is_some(),
        worker_concurrency = %config.worker_concurrency,
        "Service configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    let providers = Providers::from_config(&config);
    let (state, job_rx) = AppState::new(store, config.clone(), providers);

    // Worker pool plus startup recovery (re-queue unfinished jobs, resume
    // orphaned deployment monitors).
    let _workers = state.start_workers(job_rx);

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
