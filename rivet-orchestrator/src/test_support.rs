//! Builders shared by the unit tests

use async_trait::async_trait;
use rivet_core::domain::pipeline::{Pipeline, Stage};
use rivet_core::domain::processable::{
    Processable, ProcessableKind, ProcessableStatus, SchedulingType, When,
};
use rivet_core::domain::status::Status;
use std::ops::Deref;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::repository::{InMemoryStore, PipelineStore, StoreError, StoreResult};

/// Inserts a created pipeline with one stage per name, in order
pub fn pipeline_with_stages(store: &InMemoryStore, names: &[&str]) -> (Pipeline, Vec<Stage>) {
    let now = chrono::Utc::now();
    let pipeline = Pipeline {
        id: Uuid::new_v4(),
        status: Status::Created,
        needs_processing: false,
        created_at: now,
        updated_at: now,
    };
    store.insert_pipeline(pipeline.clone());

    let stages: Vec<Stage> = names
        .iter()
        .enumerate()
        .map(|(position, name)| Stage {
            id: Uuid::new_v4(),
            pipeline_id: pipeline.id,
            position: position as i32,
            name: name.to_string(),
            status: Status::Created,
        })
        .collect();
    for stage in &stages {
        store.insert_stage(stage.clone());
    }

    (pipeline, stages)
}

/// A stage-scheduled `on_success` build job that has not been processed yet
pub fn job(pipeline_id: Uuid, name: &str, stage_idx: i32, status: Status) -> Processable {
    Processable {
        id: Uuid::new_v4(),
        pipeline_id,
        name: name.to_string(),
        kind: ProcessableKind::Build,
        stage_idx,
        status,
        lock_version: 0,
        scheduling_type: SchedulingType::Stage,
        needs: Vec::new(),
        when: When::OnSuccess,
        allow_failure: false,
        user_id: None,
        processed: false,
    }
}

/// A DAG-scheduled job needing the given names
pub fn dag_job(
    pipeline_id: Uuid,
    name: &str,
    stage_idx: i32,
    status: Status,
    needs: &[&str],
) -> Processable {
    Processable {
        scheduling_type: SchedulingType::Dag,
        needs: needs.iter().map(|n| n.to_string()).collect(),
        ..job(pipeline_id, name, stage_idx, status)
    }
}

/// [`InMemoryStore`] with injectable concurrency and failures
///
/// Derefs to the wrapped store so the fixtures above work on it directly.
#[derive(Debug, Default)]
pub struct HookedStore {
    inner: InMemoryStore,
    /// Conditional writes that lose a race against a concurrent no-op write
    stale_writes: AtomicUsize,
    /// Status a concurrent writer moves the row to right before our next write
    concurrent_status: Mutex<Option<Status>>,
    /// Time the status snapshot takes to load
    snapshot_delay: Duration,
    /// Time the ordered stages take to load
    stages_delay: Duration,
    /// Status change a runner reports right after the flag is recomputed
    change_after_refresh: Mutex<Option<(Uuid, Status)>>,
    fail_stage_writes: AtomicBool,
    writes: AtomicUsize,
}

impl HookedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_writes(self, count: usize) -> Self {
        self.stale_writes.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_concurrent_status(self, status: Status) -> Self {
        *self.concurrent_status.lock().unwrap() = Some(status);
        self
    }

    pub fn with_snapshot_delay(self, delay: Duration) -> Self {
        Self {
            snapshot_delay: delay,
            ..self
        }
    }

    pub fn with_stages_delay(self, delay: Duration) -> Self {
        Self {
            stages_delay: delay,
            ..self
        }
    }

    pub fn with_change_after_refresh(self, id: Uuid, status: Status) -> Self {
        *self.change_after_refresh.lock().unwrap() = Some((id, status));
        self
    }

    pub fn with_failing_stage_writes(self) -> Self {
        self.fail_stage_writes.store(true, Ordering::SeqCst);
        self
    }

    /// Conditional processable writes attempted through this wrapper
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn interfere(&self, id: Uuid) -> StoreResult<()> {
        let Some(current) = self.inner.processable(id) else {
            return Ok(());
        };

        let concurrent = self.concurrent_status.lock().unwrap().take();
        if let Some(status) = concurrent {
            self.inner
                .update_processable_status(id, current.lock_version, status)
                .await?;
        } else if self
            .stale_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            self.inner
                .update_processable_status(id, current.lock_version, current.status)
                .await?;
        }

        Ok(())
    }
}

impl Deref for HookedStore {
    type Target = InMemoryStore;

    fn deref(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl PipelineStore for HookedStore {
    async fn find_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        self.inner.find_pipeline(id).await
    }

    async fn ordered_stages(&self, pipeline_id: Uuid) -> StoreResult<Vec<Stage>> {
        let stages = self.inner.ordered_stages(pipeline_id).await?;
        if !self.stages_delay.is_zero() {
            tokio::time::sleep(self.stages_delay).await;
        }
        Ok(stages)
    }

    async fn processable_statuses(&self, pipeline_id: Uuid) -> StoreResult<Vec<ProcessableStatus>> {
        let snapshot = self.inner.processable_statuses(pipeline_id).await?;
        if !self.snapshot_delay.is_zero() {
            tokio::time::sleep(self.snapshot_delay).await;
        }
        Ok(snapshot)
    }

    async fn find_processable(&self, id: Uuid) -> StoreResult<Option<Processable>> {
        self.inner.find_processable(id).await
    }

    async fn created_processables(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<Processable>> {
        self.inner.created_processables(pipeline_id, ids).await
    }

    async fn update_processable_status(
        &self,
        id: Uuid,
        expected_lock_version: i32,
        status: Status,
    ) -> StoreResult<Option<i32>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.interfere(id).await?;
        self.inner
            .update_processable_status(id, expected_lock_version, status)
            .await
    }

    async fn update_stage_status(&self, stage_id: Uuid, status: Status) -> StoreResult<bool> {
        if self.fail_stage_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupted("injected stage write failure".to_string()));
        }
        self.inner.update_stage_status(stage_id, status).await
    }

    async fn update_pipeline_status(&self, pipeline_id: Uuid, status: Status) -> StoreResult<bool> {
        self.inner.update_pipeline_status(pipeline_id, status).await
    }

    async fn mark_processed(
        &self,
        pipeline_id: Uuid,
        processables: &[(Uuid, i32)],
    ) -> StoreResult<u64> {
        self.inner.mark_processed(pipeline_id, processables).await
    }

    async fn refresh_needs_processing(&self, pipeline_id: Uuid) -> StoreResult<bool> {
        let stale = self.inner.refresh_needs_processing(pipeline_id).await?;

        let change = self.change_after_refresh.lock().unwrap().take();
        if let Some((id, status)) = change {
            if let Some(current) = self.inner.processable(id) {
                self.inner
                    .update_processable_status(id, current.lock_version, status)
                    .await?;
            }
        }

        Ok(stale)
    }
}
