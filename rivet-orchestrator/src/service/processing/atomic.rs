//! Atomic Processing Service
//!
//! One processing pass over a pipeline: advance every eligible created
//! processable stage by stage, persist the stage and pipeline composites,
//! consume the status changes the pass has seen, and re-enqueue the pipeline
//! when changes arrived that it did not see.

use rivet_core::domain::pipeline::Stage;
use rivet_core::processing::StatusCollection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ProcessingSettings;
use crate::repository::{PipelineStore, StoreError};
use crate::service::cache::CacheInvalidator;
use crate::service::lease::ExclusiveLeaseGuard;
use crate::service::processing::transition::TransitionPolicy;
use crate::service::processing::updater::{ProcessableUpdater, UpdateOutcome, previous_status};
use crate::service::queue::{ProcessingQueue, QueueError};

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),
}

/// What a call to [`AtomicProcessingService::process`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A pass ran to completion
    Processed,
    /// Nothing changed since the last pass
    NotNeeded,
    /// Another pass holds the pipeline's lease
    AlreadyProcessing,
}

impl ProcessOutcome {
    pub fn processed(self) -> bool {
        self == ProcessOutcome::Processed
    }
}

/// Lease key serializing passes over one pipeline
pub fn lease_key(pipeline_id: Uuid) -> String {
    format!("rivet:pipeline_processing:atomic:pipeline_id:{}", pipeline_id)
}

pub struct AtomicProcessingService {
    store: Arc<dyn PipelineStore>,
    lease: ExclusiveLeaseGuard,
    queue: Arc<dyn ProcessingQueue>,
    cache: Arc<dyn CacheInvalidator>,
    policy: Arc<dyn TransitionPolicy>,
    settings: ProcessingSettings,
}

impl AtomicProcessingService {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        lease: ExclusiveLeaseGuard,
        queue: Arc<dyn ProcessingQueue>,
        cache: Arc<dyn CacheInvalidator>,
        policy: Arc<dyn TransitionPolicy>,
        settings: ProcessingSettings,
    ) -> Self {
        Self {
            store,
            lease,
            queue,
            cache,
            policy,
            settings,
        }
    }

    /// Runs a processing pass over a pipeline if it needs one
    ///
    /// The pass runs under the pipeline's lease, which is released before
    /// this returns on every path. On error nothing is marked processed, so
    /// the pipeline keeps needing processing and a retried request redoes
    /// the remaining work.
    pub async fn process(&self, pipeline_id: Uuid) -> Result<ProcessOutcome, ProcessingError> {
        let pipeline = self
            .store
            .find_pipeline(pipeline_id)
            .await?
            .ok_or(ProcessingError::PipelineNotFound(pipeline_id))?;

        if !pipeline.needs_processing {
            debug!("Pipeline {} does not need processing", pipeline_id);
            return Ok(ProcessOutcome::NotNeeded);
        }

        let key = lease_key(pipeline_id);
        if self
            .lease
            .try_obtain_lease(&key, self.run_pass(pipeline_id))
            .await?
            .is_none()
        {
            info!("Pipeline {} is already being processed", pipeline_id);
            return Ok(ProcessOutcome::AlreadyProcessing);
        }

        // Changes landing while the lease was held were turned away by it,
        // so the flag is read again only once the lease is released.
        let still_stale = self
            .store
            .find_pipeline(pipeline_id)
            .await?
            .is_some_and(|pipeline| pipeline.needs_processing);

        if still_stale {
            info!(
                "Pipeline {} changed during processing, enqueueing another pass",
                pipeline_id
            );
            self.queue.enqueue(pipeline_id).await?;
        }

        Ok(ProcessOutcome::Processed)
    }

    async fn run_pass(&self, pipeline_id: Uuid) -> Result<(), ProcessingError> {
        let stages = self.store.ordered_stages(pipeline_id).await?;
        let snapshot = self.store.processable_statuses(pipeline_id).await?;
        let mut collection = StatusCollection::with_batch_size(snapshot, self.settings.batch_size);

        debug!(
            "Processing pipeline {} ({} stages, {} processables)",
            pipeline_id,
            stages.len(),
            collection.len()
        );

        let updater = ProcessableUpdater::new(
            self.store.as_ref(),
            self.policy.as_ref(),
            self.settings.max_lock_attempts,
        );

        for stage in &stages {
            self.process_stage(pipeline_id, stage, &updater, &mut collection)
                .await?;
        }

        let status = collection.status_of_all();
        if self.store.update_pipeline_status(pipeline_id, status).await? {
            info!("Pipeline {} is now {}", pipeline_id, status);
        }

        let in_flight = collection.processing_processables();
        let mut consumed = 0;
        for batch in in_flight.chunks(self.settings.batch_size.max(1)) {
            consumed += self.store.mark_processed(pipeline_id, batch).await?;
        }
        let stale = self.store.refresh_needs_processing(pipeline_id).await?;
        debug!(
            "Pipeline {}: consumed {} of {} status changes (stale: {})",
            pipeline_id,
            consumed,
            in_flight.len(),
            stale
        );

        self.cache.invalidate(pipeline_id);

        Ok(())
    }

    async fn process_stage(
        &self,
        pipeline_id: Uuid,
        stage: &Stage,
        updater: &ProcessableUpdater<'_>,
        collection: &mut StatusCollection,
    ) -> Result<(), ProcessingError> {
        for batch in collection.created_processable_ids_in_stage(stage.position) {
            let processables = self.store.created_processables(pipeline_id, &batch).await?;

            for processable in &processables {
                let previous = previous_status(collection, processable);
                match updater.update(processable, previous, collection).await? {
                    UpdateOutcome::NotEligible => {}
                    outcome => debug!("Processable {}: {:?}", processable.id, outcome),
                }
            }
        }

        let status = collection.status_of_stage(stage.position);
        if self.store.update_stage_status(stage.id, status).await? {
            debug!(
                "Stage {} of pipeline {} is now {}",
                stage.name, pipeline_id, status
            );
        }

        Ok(())
    }
}
