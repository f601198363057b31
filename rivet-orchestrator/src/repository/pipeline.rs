//! Pipeline Repository
//!
//! Handles all database operations related to pipelines.

use rivet_core::domain::pipeline::Pipeline;
use rivet_core::domain::status::Status;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{StoreError, parse_status};

/// Find a pipeline by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, status, needs_processing, created_at, updated_at
        FROM pipelines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Pipeline::try_from).transpose()
}

/// Update pipeline status, skipping the write when nothing changes
pub async fn update_status(
    pool: &PgPool,
    pipeline_id: Uuid,
    status: Status,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET status = $1, updated_at = $2
        WHERE id = $3 AND status <> $1
        "#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(pipeline_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Recompute `needs_processing` from the processables of a pipeline
///
/// The pipeline row is locked first. Status changes flag the pipeline inside
/// their own transaction, so a change either commits before the recount (and
/// is seen by it) or waits for this transaction and sets the flag again.
pub async fn refresh_needs_processing(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query("SELECT id FROM pipelines WHERE id = $1 FOR UPDATE")
        .bind(pipeline_id)
        .fetch_optional(&mut *tx)
        .await?;

    if locked.is_none() {
        tx.rollback().await?;
        return Ok(false);
    }

    let (stale,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM processables
            WHERE pipeline_id = $1 AND NOT processed
        )
        "#,
    )
    .bind(pipeline_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE pipelines SET needs_processing = $1 WHERE id = $2")
        .bind(stale)
        .bind(pipeline_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(stale)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    status: String,
    needs_processing: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = StoreError;

    fn try_from(row: PipelineRow) -> Result<Self, Self::Error> {
        Ok(Pipeline {
            id: row.id,
            status: parse_status(&row.status)?,
            needs_processing: row.needs_processing,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
