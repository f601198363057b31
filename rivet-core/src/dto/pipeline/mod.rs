//! Pipeline DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::{Pipeline, Stage};
use crate::domain::status::Status;

/// Result of a processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPipelineResponse {
    /// `true` only when a processing pass actually ran
    pub processed: bool,
}

/// Current status of a pipeline and its stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatusView {
    pub pipeline_id: Uuid,
    pub status: Status,
    pub needs_processing: bool,
    pub stages: Vec<StageStatusView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatusView {
    pub name: String,
    pub position: i32,
    pub status: Status,
}

impl From<&Stage> for StageStatusView {
    fn from(stage: &Stage) -> Self {
        Self {
            name: stage.name.clone(),
            position: stage.position,
            status: stage.status,
        }
    }
}

impl PipelineStatusView {
    pub fn new(pipeline: &Pipeline, stages: &[Stage]) -> Self {
        Self {
            pipeline_id: pipeline.id,
            status: pipeline.status,
            needs_processing: pipeline.needs_processing,
            stages: stages.iter().map(StageStatusView::from).collect(),
        }
    }
}
