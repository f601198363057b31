//! Pipeline domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::Status;

/// A single run of a CI/CD pipeline
///
/// Structure shared between the triggering context (creates it) and the
/// processing engine (reads `id`, writes `status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub status: Status,
    /// Set in the same write that changes any processable's status,
    /// cleared once a pass has consumed every pending change.
    pub needs_processing: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A stage of a pipeline run
///
/// `position` defines the linear execution order (0-based).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub position: i32,
    pub name: String,
    pub status: Status,
}
