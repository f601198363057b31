//! In-Memory Store
//!
//! [`PipelineStore`] and [`LeaseBackend`] implementations that keep every row
//! in process memory. They follow the same locking rules as the PostgreSQL
//! backend and are compiled for tests only.

use async_trait::async_trait;
use rivet_core::domain::pipeline::{Pipeline, Stage};
use rivet_core::domain::processable::{Processable, ProcessableStatus};
use rivet_core::domain::status::Status;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::repository::lease::{LeaseBackend, LeaseToken};
use crate::repository::{PipelineStore, StoreResult};

#[derive(Debug, Default)]
struct State {
    pipelines: HashMap<Uuid, Pipeline>,
    stages: HashMap<Uuid, Stage>,
    processables: HashMap<Uuid, Processable>,
}

/// Row store held in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pipeline(&self, pipeline: Pipeline) {
        self.state().pipelines.insert(pipeline.id, pipeline);
    }

    pub fn insert_stage(&self, stage: Stage) {
        self.state().stages.insert(stage.id, stage);
    }

    /// Inserts a processable and flags its pipeline when the row is unprocessed
    pub fn insert_processable(&self, processable: Processable) {
        let mut state = self.state();
        if !processable.processed {
            if let Some(pipeline) = state.pipelines.get_mut(&processable.pipeline_id) {
                pipeline.needs_processing = true;
            }
        }
        state.processables.insert(processable.id, processable);
    }

    pub fn pipeline(&self, id: Uuid) -> Option<Pipeline> {
        self.state().pipelines.get(&id).cloned()
    }

    pub fn stage(&self, id: Uuid) -> Option<Stage> {
        self.state().stages.get(&id).cloned()
    }

    pub fn processable(&self, id: Uuid) -> Option<Processable> {
        self.state().processables.get(&id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PipelineStore for InMemoryStore {
    async fn find_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        Ok(self.pipeline(id))
    }

    async fn ordered_stages(&self, pipeline_id: Uuid) -> StoreResult<Vec<Stage>> {
        let mut stages: Vec<Stage> = self
            .state()
            .stages
            .values()
            .filter(|s| s.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.position);
        Ok(stages)
    }

    async fn processable_statuses(&self, pipeline_id: Uuid) -> StoreResult<Vec<ProcessableStatus>> {
        let state = self.state();
        let mut processables: Vec<&Processable> = state
            .processables
            .values()
            .filter(|p| p.pipeline_id == pipeline_id)
            .collect();
        processables.sort_by(|a, b| (a.stage_idx, &a.name).cmp(&(b.stage_idx, &b.name)));
        Ok(processables.into_iter().map(ProcessableStatus::from).collect())
    }

    async fn find_processable(&self, id: Uuid) -> StoreResult<Option<Processable>> {
        Ok(self.processable(id))
    }

    async fn created_processables(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<Processable>> {
        let state = self.state();
        let mut processables: Vec<Processable> = ids
            .iter()
            .filter_map(|id| state.processables.get(id))
            .filter(|p| p.pipeline_id == pipeline_id && p.status == Status::Created)
            .cloned()
            .collect();
        processables.sort_by(|a, b| (a.stage_idx, &a.name).cmp(&(b.stage_idx, &b.name)));
        Ok(processables)
    }

    async fn update_processable_status(
        &self,
        id: Uuid,
        expected_lock_version: i32,
        status: Status,
    ) -> StoreResult<Option<i32>> {
        let mut state = self.state();

        let Some(processable) = state.processables.get_mut(&id) else {
            return Ok(None);
        };
        if processable.lock_version != expected_lock_version {
            return Ok(None);
        }

        processable.status = status;
        processable.lock_version += 1;
        processable.processed = false;
        let (pipeline_id, lock_version) = (processable.pipeline_id, processable.lock_version);

        if let Some(pipeline) = state.pipelines.get_mut(&pipeline_id) {
            pipeline.needs_processing = true;
            pipeline.updated_at = chrono::Utc::now();
        }

        Ok(Some(lock_version))
    }

    async fn update_stage_status(&self, stage_id: Uuid, status: Status) -> StoreResult<bool> {
        Ok(match self.state().stages.get_mut(&stage_id) {
            Some(stage) if stage.status != status => {
                stage.status = status;
                true
            }
            _ => false,
        })
    }

    async fn update_pipeline_status(&self, pipeline_id: Uuid, status: Status) -> StoreResult<bool> {
        Ok(match self.state().pipelines.get_mut(&pipeline_id) {
            Some(pipeline) if pipeline.status != status => {
                pipeline.status = status;
                pipeline.updated_at = chrono::Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn mark_processed(
        &self,
        pipeline_id: Uuid,
        processables: &[(Uuid, i32)],
    ) -> StoreResult<u64> {
        let mut state = self.state();
        let mut marked = 0;

        for (id, lock_version) in processables {
            if let Some(processable) = state.processables.get_mut(id) {
                if processable.pipeline_id == pipeline_id && processable.lock_version == *lock_version
                {
                    processable.processed = true;
                    marked += 1;
                }
            }
        }

        Ok(marked)
    }

    async fn refresh_needs_processing(&self, pipeline_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state();

        let stale = state
            .processables
            .values()
            .any(|p| p.pipeline_id == pipeline_id && !p.processed);

        Ok(match state.pipelines.get_mut(&pipeline_id) {
            Some(pipeline) => {
                pipeline.needs_processing = stale;
                stale
            }
            None => false,
        })
    }
}

/// Leases held in memory, expiring on the tokio clock
#[derive(Debug, Default)]
pub struct InMemoryLease {
    leases: Mutex<HashMap<String, (LeaseToken, Instant)>>,
}

impl InMemoryLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired lease is held for `key`
    pub fn is_held(&self, key: &str) -> bool {
        self.leases()
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<String, (LeaseToken, Instant)>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LeaseBackend for InMemoryLease {
    async fn try_obtain(&self, key: &str, timeout: Duration) -> StoreResult<Option<LeaseToken>> {
        let now = Instant::now();
        let mut leases = self.leases();

        if let Some((_, expires_at)) = leases.get(key) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let token = LeaseToken::generate();
        leases.insert(key.to_string(), (token, now + timeout));
        Ok(Some(token))
    }

    async fn cancel(&self, key: &str, token: LeaseToken) -> StoreResult<()> {
        let mut leases = self.leases();
        if leases.get(key).is_some_and(|(holder, _)| *holder == token) {
            leases.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{job, pipeline_with_stages};

    #[tokio::test]
    async fn test_stale_lock_version_is_rejected() {
        let store = InMemoryStore::new();
        let (pipeline, _) = pipeline_with_stages(&store, &["build"]);
        let build = job(pipeline.id, "build", 0, Status::Created);
        store.insert_processable(build.clone());

        let first = store
            .update_processable_status(build.id, 0, Status::Pending)
            .await
            .unwrap();
        let second = store
            .update_processable_status(build.id, 0, Status::Running)
            .await
            .unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(second, None);
        let stored = store.processable(build.id).unwrap();
        assert_eq!(stored.status, Status::Pending);
        assert_eq!(stored.lock_version, 1);
    }

    #[tokio::test]
    async fn test_status_change_flags_pipeline() {
        let store = InMemoryStore::new();
        let (pipeline, _) = pipeline_with_stages(&store, &["build"]);
        let mut build = job(pipeline.id, "build", 0, Status::Created);
        build.processed = true;
        store.insert_processable(build.clone());
        assert!(!store.pipeline(pipeline.id).unwrap().needs_processing);

        store
            .update_processable_status(build.id, 0, Status::Pending)
            .await
            .unwrap();

        assert!(store.pipeline(pipeline.id).unwrap().needs_processing);
        assert!(!store.processable(build.id).unwrap().processed);
    }

    #[tokio::test]
    async fn test_mark_processed_skips_changed_rows() {
        let store = InMemoryStore::new();
        let (pipeline, _) = pipeline_with_stages(&store, &["build"]);
        let a = job(pipeline.id, "a", 0, Status::Success);
        let b = job(pipeline.id, "b", 0, Status::Running);
        store.insert_processable(a.clone());
        store.insert_processable(b.clone());

        // b moves on after the pair was captured
        store
            .update_processable_status(b.id, 0, Status::Success)
            .await
            .unwrap();

        let marked = store
            .mark_processed(pipeline.id, &[(a.id, 0), (b.id, 0)])
            .await
            .unwrap();

        assert_eq!(marked, 1);
        assert!(store.refresh_needs_processing(pipeline.id).await.unwrap());

        store.mark_processed(pipeline.id, &[(b.id, 1)]).await.unwrap();
        assert!(!store.refresh_needs_processing(pipeline.id).await.unwrap());
        assert!(!store.pipeline(pipeline.id).unwrap().needs_processing);
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_until_cancelled() {
        let lease = InMemoryLease::new();
        let timeout = Duration::from_secs(60);

        let token = lease.try_obtain("pipeline:1", timeout).await.unwrap().unwrap();
        assert!(lease.try_obtain("pipeline:1", timeout).await.unwrap().is_none());
        assert!(lease.try_obtain("pipeline:2", timeout).await.unwrap().is_some());

        lease.cancel("pipeline:1", token).await.unwrap();
        assert!(lease.try_obtain("pipeline:1", timeout).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lease_cancel_requires_holder_token() {
        let lease = InMemoryLease::new();
        let timeout = Duration::from_secs(60);

        lease.try_obtain("pipeline:1", timeout).await.unwrap().unwrap();
        lease.cancel("pipeline:1", LeaseToken::generate()).await.unwrap();

        assert!(lease.is_held("pipeline:1"));
    }

    #[tokio::test]
    async fn test_lease_expires() {
        let lease = InMemoryLease::new();

        lease
            .try_obtain("pipeline:1", Duration::from_millis(20))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!lease.is_held("pipeline:1"));
        assert!(
            lease
                .try_obtain("pipeline:1", Duration::from_secs(60))
                .await
                .unwrap()
                .is_some()
        );
    }
}
