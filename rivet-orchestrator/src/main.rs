use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::repository::{PgLease, PgStore, PipelineStore};
use crate::service::cache::PipelineStatusCache;
use crate::service::lease::ExclusiveLeaseGuard;
use crate::service::processing::{AtomicProcessingService, WhenPolicy};
use crate::service::queue::{ChannelQueue, ProcessWorker, ProcessingQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rivet_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rivet Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Wire the processing engine
    let store: Arc<dyn PipelineStore> = Arc::new(PgStore::new(pool.clone()));
    let lease = ExclusiveLeaseGuard::new(
        Arc::new(PgLease::new(pool)),
        config.processing.lease_timeout,
    );
    let cache = Arc::new(PipelineStatusCache::new());
    let (channel, receiver) = ChannelQueue::new();
    let queue: Arc<dyn ProcessingQueue> = Arc::new(channel.clone());

    let processing = Arc::new(AtomicProcessingService::new(
        store.clone(),
        lease,
        queue.clone(),
        cache.clone(),
        Arc::new(WhenPolicy),
        config.processing,
    ));

    let worker = ProcessWorker::new(
        processing.clone(),
        channel,
        config.worker_concurrency,
        config.max_retries,
        config.retry_delay,
    );
    tokio::spawn(worker.run(receiver));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        store,
        processing,
        queue,
        cache,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
