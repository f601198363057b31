//! PostgreSQL Store
//!
//! [`PipelineStore`] implementation over the per-table repository functions.

use async_trait::async_trait;
use rivet_core::domain::pipeline::{Pipeline, Stage};
use rivet_core::domain::processable::{Processable, ProcessableStatus};
use rivet_core::domain::status::Status;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{
    PipelineStore, StoreResult, pipeline_repository, processable_repository, stage_repository,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn find_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        pipeline_repository::find_by_id(&self.pool, id).await
    }

    async fn ordered_stages(&self, pipeline_id: Uuid) -> StoreResult<Vec<Stage>> {
        stage_repository::find_by_pipeline(&self.pool, pipeline_id).await
    }

    async fn processable_statuses(&self, pipeline_id: Uuid) -> StoreResult<Vec<ProcessableStatus>> {
        processable_repository::find_statuses_by_pipeline(&self.pool, pipeline_id).await
    }

    async fn find_processable(&self, id: Uuid) -> StoreResult<Option<Processable>> {
        processable_repository::find_by_id(&self.pool, id).await
    }

    async fn created_processables(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<Processable>> {
        processable_repository::find_created_by_ids(&self.pool, pipeline_id, ids).await
    }

    async fn update_processable_status(
        &self,
        id: Uuid,
        expected_lock_version: i32,
        status: Status,
    ) -> StoreResult<Option<i32>> {
        Ok(
            processable_repository::update_status_with_lock(
                &self.pool,
                id,
                expected_lock_version,
                status,
            )
            .await?,
        )
    }

    async fn update_stage_status(&self, stage_id: Uuid, status: Status) -> StoreResult<bool> {
        Ok(stage_repository::update_status(&self.pool, stage_id, status).await?)
    }

    async fn update_pipeline_status(&self, pipeline_id: Uuid, status: Status) -> StoreResult<bool> {
        Ok(pipeline_repository::update_status(&self.pool, pipeline_id, status).await?)
    }

    async fn mark_processed(
        &self,
        pipeline_id: Uuid,
        processables: &[(Uuid, i32)],
    ) -> StoreResult<u64> {
        Ok(processable_repository::mark_processed(&self.pool, pipeline_id, processables).await?)
    }

    async fn refresh_needs_processing(&self, pipeline_id: Uuid) -> StoreResult<bool> {
        Ok(pipeline_repository::refresh_needs_processing(&self.pool, pipeline_id).await?)
    }
}
