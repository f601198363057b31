//! Processable API Handlers
//!
//! HTTP endpoints for reporting processable status changes.

use axum::{
    Json,
    extract::{Path, State},
};
use rivet_core::dto::processable::{ProcessableStatusChanged, UpdateProcessableStatus};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::processable_service;

/// PUT /processable/{id}/status
/// Report a status change; the owning pipeline is queued for processing
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProcessableStatus>,
) -> ApiResult<Json<ProcessableStatusChanged>> {
    tracing::info!("Processable {} reported status {}", id, req.status);

    let changed =
        processable_service::update_status(state.store.as_ref(), state.queue.as_ref(), id, req)
            .await?;

    Ok(Json(changed))
}
