//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod pipeline;
pub mod processable;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::repository::PipelineStore;
use crate::service::cache::PipelineStatusCache;
use crate::service::processing::AtomicProcessingService;
use crate::service::queue::ProcessingQueue;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PipelineStore>,
    pub processing: Arc<AtomicProcessingService>,
    pub queue: Arc<dyn ProcessingQueue>,
    pub cache: Arc<PipelineStatusCache>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/{id}/process", post(pipeline::process_pipeline))
        .route(
            "/pipeline/{id}/process/async",
            post(pipeline::request_processing),
        )
        .route("/pipeline/{id}/status", get(pipeline::get_status))
        // Processable endpoints
        .route(
            "/processable/{id}/status",
            put(processable::update_status),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) fn test_state() -> (
    AppState,
    Arc<crate::repository::InMemoryStore>,
    tokio::sync::mpsc::UnboundedReceiver<crate::service::queue::ProcessRequest>,
) {
    use crate::config::ProcessingSettings;
    use crate::repository::InMemoryStore;
    use crate::repository::memory::InMemoryLease;
    use crate::service::lease::ExclusiveLeaseGuard;
    use crate::service::processing::WhenPolicy;
    use crate::service::queue::ChannelQueue;

    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(PipelineStatusCache::new());
    let (queue, requests) = ChannelQueue::new();
    let queue: Arc<dyn ProcessingQueue> = Arc::new(queue);
    let settings = ProcessingSettings::default();

    let processing = Arc::new(AtomicProcessingService::new(
        store.clone(),
        ExclusiveLeaseGuard::new(Arc::new(InMemoryLease::new()), settings.lease_timeout),
        queue.clone(),
        cache.clone(),
        Arc::new(WhenPolicy),
        settings,
    ));

    let state = AppState {
        store: store.clone(),
        processing,
        queue,
        cache,
    };

    (state, store, requests)
}
