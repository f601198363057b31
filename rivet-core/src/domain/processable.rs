//! Processable domain types
//!
//! A processable is any unit of pipeline work that carries a status and
//! belongs to a stage: a build job or a bridge that triggers another pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::Status;

/// A job or bridge within a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processable {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub kind: ProcessableKind,
    /// Position of the owning stage
    pub stage_idx: i32,
    pub status: Status,
    /// Incremented on every persisted mutation
    pub lock_version: i32,
    pub scheduling_type: SchedulingType,
    /// Names of the processables this one depends on (DAG scheduling only)
    pub needs: Vec<String>,
    pub when: When,
    pub allow_failure: bool,
    pub user_id: Option<Uuid>,
    /// `false` while the latest status change has not been consumed by a pass
    pub processed: bool,
}

impl Processable {
    pub fn is_dag(&self) -> bool {
        self.scheduling_type == SchedulingType::Dag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessableKind {
    Build,
    Bridge,
}

/// How a processable finds its predecessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingType {
    /// Waits for every processable of all earlier stages
    Stage,
    /// Waits only for the processables named in `needs`
    Dag,
}

/// Condition under which a processable runs once its predecessors complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
    Manual,
    Delayed,
}

/// The slice of a processable the status collection works on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessableStatus {
    pub id: Uuid,
    pub name: String,
    pub stage_idx: i32,
    pub status: Status,
    pub allow_failure: bool,
    pub lock_version: i32,
    pub processed: bool,
}

impl From<&Processable> for ProcessableStatus {
    fn from(processable: &Processable) -> Self {
        Self {
            id: processable.id,
            name: processable.name.clone(),
            stage_idx: processable.stage_idx,
            status: processable.status,
            allow_failure: processable.allow_failure,
            lock_version: processable.lock_version,
            processed: processable.processed,
        }
    }
}
