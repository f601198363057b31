//! Processable DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::Status;

/// Status change reported for a processable
///
/// `lock_version` is the version the reporter last observed; the change is
/// rejected if the processable has moved on since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProcessableStatus {
    pub status: Status,
    pub lock_version: i32,
}

/// Processable state after an accepted status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessableStatusChanged {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: Status,
    pub lock_version: i32,
}
