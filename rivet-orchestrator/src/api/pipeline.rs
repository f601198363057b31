//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline processing and status.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rivet_core::dto::pipeline::{PipelineStatusView, ProcessPipelineResponse};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

/// POST /pipeline/{id}/process
/// Run a processing pass and report whether it ran
pub async fn process_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProcessPipelineResponse>> {
    tracing::debug!("Processing pipeline: {}", id);

    let response = pipeline_service::process_pipeline(&state.processing, id).await?;

    Ok(Json(response))
}

/// POST /pipeline/{id}/process/async
/// Queue a processing pass
pub async fn request_processing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    pipeline_service::request_processing(state.store.as_ref(), state.queue.as_ref(), id).await?;

    Ok(StatusCode::ACCEPTED)
}

/// GET /pipeline/{id}/status
/// Get pipeline and stage statuses
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineStatusView>> {
    tracing::debug!("Getting pipeline status: {}", id);

    let view = pipeline_service::get_status(state.store.as_ref(), &state.cache, id).await?;

    Ok(Json(view))
}
