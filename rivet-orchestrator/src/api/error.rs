//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::StoreError;
use crate::service::pipeline_service::PipelineError;
use crate::service::processable_service::ProcessableError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    StoreError(StoreError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreError(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(id) => ApiError::NotFound(format!("Pipeline {} not found", id)),
            PipelineError::StoreError(err) => ApiError::StoreError(err),
            PipelineError::QueueError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<ProcessableError> for ApiError {
    fn from(err: ProcessableError) -> Self {
        match err {
            ProcessableError::NotFound(id) => {
                ApiError::NotFound(format!("Processable {} not found", id))
            }
            ProcessableError::InvalidState(msg) => ApiError::BadRequest(msg),
            ProcessableError::StaleLockVersion(id) => {
                ApiError::Conflict(format!("Processable {} was modified concurrently", id))
            }
            ProcessableError::StoreError(err) => ApiError::StoreError(err),
            ProcessableError::QueueError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
