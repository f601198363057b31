//! Stage Repository
//!
//! Handles all database operations related to pipeline stages.

use rivet_core::domain::pipeline::Stage;
use rivet_core::domain::status::Status;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{StoreError, parse_status};

/// Find the stages of a pipeline, ordered by position
pub async fn find_by_pipeline(pool: &PgPool, pipeline_id: Uuid) -> Result<Vec<Stage>, StoreError> {
    let rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, pipeline_id, position, name, status
        FROM stages
        WHERE pipeline_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Stage::try_from).collect()
}

/// Update stage status, skipping the write when nothing changes
pub async fn update_status(pool: &PgPool, stage_id: Uuid, status: Status) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stages
        SET status = $1
        WHERE id = $2 AND status <> $1
        "#,
    )
    .bind(status.as_str())
    .bind(stage_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StageRow {
    id: Uuid,
    pipeline_id: Uuid,
    position: i32,
    name: String,
    status: String,
}

impl TryFrom<StageRow> for Stage {
    type Error = StoreError;

    fn try_from(row: StageRow) -> Result<Self, Self::Error> {
        Ok(Stage {
            id: row.id,
            pipeline_id: row.pipeline_id,
            position: row.position,
            name: row.name,
            status: parse_status(&row.status)?,
        })
    }
}
