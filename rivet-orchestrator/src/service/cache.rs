//! Pipeline Status Cache
//!
//! Read-side cache of pipeline status views served by the API. The
//! processing engine invalidates an entry after every pass; invalidation is
//! fire-and-forget and never fails the pass.

use rivet_core::dto::pipeline::PipelineStatusView;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Receives "pipeline status changed" notifications
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, pipeline_id: Uuid);
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Uuid, PipelineStatusView>,
    /// Bumped by every invalidation of a pipeline
    generations: HashMap<Uuid, u64>,
}

#[derive(Debug, Default)]
pub struct PipelineStatusCache {
    state: RwLock<CacheState>,
}

impl PipelineStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pipeline_id: Uuid) -> Option<PipelineStatusView> {
        self.read().entries.get(&pipeline_id).cloned()
    }

    /// Current generation of a pipeline, captured before reading the store
    pub fn generation(&self, pipeline_id: Uuid) -> u64 {
        self.read()
            .generations
            .get(&pipeline_id)
            .copied()
            .unwrap_or_default()
    }

    /// Caches `view` unless the pipeline was invalidated since `generation`
    ///
    /// Returns whether the view was stored.
    pub fn insert(&self, view: PipelineStatusView, generation: u64) -> bool {
        let mut state = self.write();
        let current = state
            .generations
            .get(&view.pipeline_id)
            .copied()
            .unwrap_or_default();
        if current != generation {
            tracing::debug!(
                "Discarding status of pipeline {} read before an invalidation",
                view.pipeline_id
            );
            return false;
        }

        state.entries.insert(view.pipeline_id, view);
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheInvalidator for PipelineStatusCache {
    fn invalidate(&self, pipeline_id: Uuid) {
        let mut state = self.write();
        *state.generations.entry(pipeline_id).or_default() += 1;

        if state.entries.remove(&pipeline_id).is_some() {
            tracing::debug!("Invalidated cached status of pipeline {}", pipeline_id);
        }
    }
}
