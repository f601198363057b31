//! Processable Service
//!
//! Status changes reported from outside the engine (runners, users). Every
//! accepted change goes through the optimistic lock and requests a
//! processing pass for the owning pipeline.

use rivet_core::domain::status::Status;
use rivet_core::dto::processable::{ProcessableStatusChanged, UpdateProcessableStatus};
use uuid::Uuid;

use crate::repository::{PipelineStore, StoreError};
use crate::service::queue::{ProcessingQueue, QueueError};

/// Service error type
#[derive(Debug)]
pub enum ProcessableError {
    NotFound(Uuid),
    InvalidState(String),
    StaleLockVersion(Uuid),
    StoreError(StoreError),
    QueueError(QueueError),
}

impl From<StoreError> for ProcessableError {
    fn from(err: StoreError) -> Self {
        ProcessableError::StoreError(err)
    }
}

impl From<QueueError> for ProcessableError {
    fn from(err: QueueError) -> Self {
        ProcessableError::QueueError(err)
    }
}

pub type Result<T> = std::result::Result<T, ProcessableError>;

/// Apply an externally reported status change
pub async fn update_status(
    store: &dyn PipelineStore,
    queue: &dyn ProcessingQueue,
    id: Uuid,
    req: UpdateProcessableStatus,
) -> Result<ProcessableStatusChanged> {
    let processable = store
        .find_processable(id)
        .await?
        .ok_or(ProcessableError::NotFound(id))?;

    if processable.lock_version != req.lock_version {
        return Err(ProcessableError::StaleLockVersion(id));
    }

    validate_transition(processable.status, req.status)?;

    let lock_version = store
        .update_processable_status(id, req.lock_version, req.status)
        .await?
        .ok_or(ProcessableError::StaleLockVersion(id))?;

    tracing::info!(
        "Processable {} ({}) {} -> {}",
        processable.name,
        id,
        processable.status,
        req.status
    );

    queue.enqueue(processable.pipeline_id).await?;

    Ok(ProcessableStatusChanged {
        id,
        pipeline_id: processable.pipeline_id,
        status: req.status,
        lock_version,
    })
}

/// Position of a status in a processable's lifecycle
fn lifecycle_rank(status: Status) -> u8 {
    match status {
        Status::Created => 0,
        Status::Manual | Status::Scheduled => 1,
        Status::Pending => 2,
        Status::Running => 3,
        Status::Success | Status::Failed | Status::Canceled | Status::Skipped => 4,
    }
}

/// Statuses only move forward; finished processables stay finished
fn validate_transition(from: Status, to: Status) -> Result<()> {
    if from.is_terminal() {
        return Err(ProcessableError::InvalidState(format!(
            "processable already finished with status {}",
            from
        )));
    }

    if lifecycle_rank(to) <= lifecycle_rank(from) {
        return Err(ProcessableError::InvalidState(format!(
            "cannot move processable from {} to {}",
            from, to
        )));
    }

    Ok(())
}
