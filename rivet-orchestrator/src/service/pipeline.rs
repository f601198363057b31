//! Pipeline Service
//!
//! Processing requests and status reads for pipelines.

use rivet_core::dto::pipeline::{PipelineStatusView, ProcessPipelineResponse};
use uuid::Uuid;

use crate::repository::{PipelineStore, StoreError};
use crate::service::cache::PipelineStatusCache;
use crate::service::processing::{AtomicProcessingService, ProcessingError};
use crate::service::queue::{ProcessingQueue, QueueError};

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(Uuid),
    StoreError(StoreError),
    QueueError(QueueError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::StoreError(err)
    }
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        PipelineError::QueueError(err)
    }
}

impl From<ProcessingError> for PipelineError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::PipelineNotFound(id) => PipelineError::NotFound(id),
            ProcessingError::Store(err) => PipelineError::StoreError(err),
            ProcessingError::Queue(err) => PipelineError::QueueError(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Run a processing pass now
pub async fn process_pipeline(
    service: &AtomicProcessingService,
    id: Uuid,
) -> Result<ProcessPipelineResponse> {
    let outcome = service.process(id).await?;

    Ok(ProcessPipelineResponse {
        processed: outcome.processed(),
    })
}

/// Queue a processing pass for the worker
pub async fn request_processing(
    store: &dyn PipelineStore,
    queue: &dyn ProcessingQueue,
    id: Uuid,
) -> Result<()> {
    store
        .find_pipeline(id)
        .await?
        .ok_or(PipelineError::NotFound(id))?;

    queue.enqueue(id).await?;

    tracing::debug!("Processing requested for pipeline {}", id);

    Ok(())
}

/// Get the status of a pipeline and its stages
///
/// Served from the cache until the next processing pass invalidates it.
pub async fn get_status(
    store: &dyn PipelineStore,
    cache: &PipelineStatusCache,
    id: Uuid,
) -> Result<PipelineStatusView> {
    if let Some(view) = cache.get(id) {
        return Ok(view);
    }

    let generation = cache.generation(id);
    let pipeline = store
        .find_pipeline(id)
        .await?
        .ok_or(PipelineError::NotFound(id))?;
    let stages = store.ordered_stages(id).await?;

    let view = PipelineStatusView::new(&pipeline, &stages);
    cache.insert(view.clone(), generation);

    Ok(view)
}
