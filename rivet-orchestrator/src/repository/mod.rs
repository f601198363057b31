//! Repository Module
//!
//! Data access layer for the orchestrator.
//!
//! The processing engine talks to storage only through [`PipelineStore`], a
//! row store with optimistic locking on processables. `PgStore` backs it with
//! PostgreSQL (one submodule of query functions per table). Test builds also
//! get `InMemoryStore`, which keeps the rows in process memory.

pub mod lease;
#[cfg(test)]
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod processable;
pub mod stage;

pub use lease::PgLease;
#[cfg(test)]
pub use memory::InMemoryStore;
pub use postgres::PgStore;

// Re-export for convenience
pub use pipeline as pipeline_repository;
pub use processable as processable_repository;
pub use stage as stage_repository;

use async_trait::async_trait;
use rivet_core::domain::pipeline::{Pipeline, Stage};
use rivet_core::domain::processable::{Processable, ProcessableStatus};
use rivet_core::domain::status::Status;
use thiserror::Error;
use uuid::Uuid;

/// Storage error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped to a domain type
    #[error("corrupted row: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage consumed by the processing engine
///
/// Processable status writes are conditional on `lock_version` and fail
/// closed: a stale version is reported, never overwritten. Stage and pipeline
/// status writes are unconditional (one pass per pipeline at a time) and
/// report whether anything changed.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn find_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>>;

    /// Stages of a pipeline, ordered by position
    async fn ordered_stages(&self, pipeline_id: Uuid) -> StoreResult<Vec<Stage>>;

    /// Status snapshot of every processable of a pipeline
    async fn processable_statuses(&self, pipeline_id: Uuid) -> StoreResult<Vec<ProcessableStatus>>;

    async fn find_processable(&self, id: Uuid) -> StoreResult<Option<Processable>>;

    /// The given processables that are still `created`, ordered by stage
    async fn created_processables(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<Processable>>;

    /// Writes a processable status if its lock version still matches
    ///
    /// On success the lock version is incremented, the processable is flagged
    /// unprocessed and its pipeline is flagged as needing processing, all in
    /// one write. Returns the new lock version, or `None` when the expected
    /// version is stale (or the row is gone).
    async fn update_processable_status(
        &self,
        id: Uuid,
        expected_lock_version: i32,
        status: Status,
    ) -> StoreResult<Option<i32>>;

    /// Returns `true` when the stored status changed
    async fn update_stage_status(&self, stage_id: Uuid, status: Status) -> StoreResult<bool>;

    /// Returns `true` when the stored status changed
    async fn update_pipeline_status(&self, pipeline_id: Uuid, status: Status) -> StoreResult<bool>;

    /// Flags processables as processed where `(id, lock_version)` still matches
    ///
    /// Rows changed since the pair was captured stay unprocessed. Returns the
    /// number of rows flagged.
    async fn mark_processed(
        &self,
        pipeline_id: Uuid,
        processables: &[(Uuid, i32)],
    ) -> StoreResult<u64>;

    /// Recomputes the pipeline's `needs_processing` flag from its processables
    /// and returns the new value
    async fn refresh_needs_processing(&self, pipeline_id: Uuid) -> StoreResult<bool>;
}

pub(crate) fn parse_status(raw: &str) -> StoreResult<Status> {
    raw.parse::<Status>()
        .map_err(|e| StoreError::Corrupted(e.to_string()))
}
