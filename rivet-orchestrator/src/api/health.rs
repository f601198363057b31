//! Health Check API Handler
//!
//! Liveness endpoint for monitoring; does not touch the store.

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

/// GET /health
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "rivet-orchestrator" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
