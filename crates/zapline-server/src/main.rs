//! Zapline - WhatsApp campaign dispatcher entry point

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zapline_common::config::{Config, LoggingConfig};
use zapline_core::{CampaignPlanner, DispatchWorker, EvoGatewayClient, SignedUrlClient};
use zapline_storage::db::DatabasePool;
use zapline_storage::repository::TargetRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Zapline dispatcher...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Build the dispatch pipeline
    let queue = Arc::new(TargetRepository::new(db_pool.pool().clone()));
    let gateway = Arc::new(EvoGatewayClient::new(&config.gateway)?);
    let media = Arc::new(SignedUrlClient::new(&config.media)?);
    let planner = Arc::new(CampaignPlanner::new(db_pool.pool().clone()));

    let worker = DispatchWorker::new(queue, gateway, media, config.dispatcher.clone())
        .with_planner(planner);

    // Start the dispatch worker
    let worker_handle = tokio::spawn(async move {
        worker.run().await;
    });

    info!("Zapline dispatcher started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    worker_handle.abort();

    info!("Zapline dispatcher shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},zapline=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
