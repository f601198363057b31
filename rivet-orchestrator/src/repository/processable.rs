//! Processable Repository
//!
//! Handles all database operations related to processables (jobs and bridges).
//! Status writes are guarded by `lock_version`.

use rivet_core::domain::processable::{
    Processable, ProcessableKind, ProcessableStatus, SchedulingType, When,
};
use rivet_core::domain::status::Status;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{StoreError, parse_status};

/// Find a processable by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Processable>, StoreError> {
    let row = sqlx::query_as::<_, ProcessableRow>(
        r#"
        SELECT id, pipeline_id, name, kind, stage_idx, status, lock_version,
               scheduling_type, needs, when_condition, allow_failure, user_id, processed
        FROM processables
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Processable::try_from).transpose()
}

/// Find the status snapshot of every processable of a pipeline
pub async fn find_statuses_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<ProcessableStatus>, StoreError> {
    let rows = sqlx::query_as::<_, ProcessableStatusRow>(
        r#"
        SELECT id, name, stage_idx, status, allow_failure, lock_version, processed
        FROM processables
        WHERE pipeline_id = $1
        ORDER BY stage_idx ASC, name ASC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ProcessableStatus::try_from).collect()
}

/// Find the given processables that are still in `created` status
pub async fn find_created_by_ids(
    pool: &PgPool,
    pipeline_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Processable>, StoreError> {
    let rows = sqlx::query_as::<_, ProcessableRow>(
        r#"
        SELECT id, pipeline_id, name, kind, stage_idx, status, lock_version,
               scheduling_type, needs, when_condition, allow_failure, user_id, processed
        FROM processables
        WHERE pipeline_id = $1 AND id = ANY($2) AND status = $3
        ORDER BY stage_idx ASC, name ASC
        "#,
    )
    .bind(pipeline_id)
    .bind(ids)
    .bind(Status::Created.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Processable::try_from).collect()
}

/// Update processable status if the lock version still matches
///
/// Bumps the lock version, flags the processable unprocessed and flags its
/// pipeline as needing processing in one transaction. Returns the new lock
/// version, or `None` when the expected version is stale.
pub async fn update_status_with_lock(
    pool: &PgPool,
    id: Uuid,
    expected_lock_version: i32,
    status: Status,
) -> Result<Option<i32>, sqlx::Error> {
    let now = chrono::Utc::now();
    let mut tx = pool.begin().await?;

    let updated: Option<(Uuid, i32)> = sqlx::query_as(
        r#"
        UPDATE processables
        SET status = $1, lock_version = lock_version + 1, processed = FALSE
        WHERE id = $2 AND lock_version = $3
        RETURNING pipeline_id, lock_version
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .bind(expected_lock_version)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((pipeline_id, lock_version)) = updated else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE pipelines
        SET needs_processing = TRUE, updated_at = $1
        WHERE id = $2
        "#,
    )
    .bind(now)
    .bind(pipeline_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(lock_version))
}

/// Flag processables as processed where `(id, lock_version)` still matches
pub async fn mark_processed(
    pool: &PgPool,
    pipeline_id: Uuid,
    processables: &[(Uuid, i32)],
) -> Result<u64, sqlx::Error> {
    if processables.is_empty() {
        return Ok(0);
    }

    let (ids, lock_versions): (Vec<Uuid>, Vec<i32>) = processables.iter().copied().unzip();

    let result = sqlx::query(
        r#"
        UPDATE processables
        SET processed = TRUE
        WHERE pipeline_id = $1
          AND (id, lock_version) IN (
              SELECT * FROM UNNEST($2::uuid[], $3::int4[])
          )
        "#,
    )
    .bind(pipeline_id)
    .bind(&ids)
    .bind(&lock_versions)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Helper Functions
// =============================================================================

fn string_to_kind(s: &str) -> Result<ProcessableKind, StoreError> {
    match s {
        "build" => Ok(ProcessableKind::Build),
        "bridge" => Ok(ProcessableKind::Bridge),
        _ => Err(StoreError::Corrupted(format!("unknown processable kind: {}", s))),
    }
}

fn string_to_scheduling_type(s: &str) -> Result<SchedulingType, StoreError> {
    match s {
        "stage" => Ok(SchedulingType::Stage),
        "dag" => Ok(SchedulingType::Dag),
        _ => Err(StoreError::Corrupted(format!("unknown scheduling type: {}", s))),
    }
}

fn string_to_when(s: &str) -> Result<When, StoreError> {
    match s {
        "on_success" => Ok(When::OnSuccess),
        "on_failure" => Ok(When::OnFailure),
        "always" => Ok(When::Always),
        "manual" => Ok(When::Manual),
        "delayed" => Ok(When::Delayed),
        _ => Err(StoreError::Corrupted(format!("unknown when condition: {}", s))),
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProcessableRow {
    id: Uuid,
    pipeline_id: Uuid,
    name: String,
    kind: String,
    stage_idx: i32,
    status: String,
    lock_version: i32,
    scheduling_type: String,
    needs: Vec<String>,
    when_condition: String,
    allow_failure: bool,
    user_id: Option<Uuid>,
    processed: bool,
}

impl TryFrom<ProcessableRow> for Processable {
    type Error = StoreError;

    fn try_from(row: ProcessableRow) -> Result<Self, Self::Error> {
        Ok(Processable {
            id: row.id,
            pipeline_id: row.pipeline_id,
            name: row.name,
            kind: string_to_kind(&row.kind)?,
            stage_idx: row.stage_idx,
            status: parse_status(&row.status)?,
            lock_version: row.lock_version,
            scheduling_type: string_to_scheduling_type(&row.scheduling_type)?,
            needs: row.needs,
            when: string_to_when(&row.when_condition)?,
            allow_failure: row.allow_failure,
            user_id: row.user_id,
            processed: row.processed,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProcessableStatusRow {
    id: Uuid,
    name: String,
    stage_idx: i32,
    status: String,
    allow_failure: bool,
    lock_version: i32,
    processed: bool,
}

impl TryFrom<ProcessableStatusRow> for ProcessableStatus {
    type Error = StoreError;

    fn try_from(row: ProcessableStatusRow) -> Result<Self, Self::Error> {
        Ok(ProcessableStatus {
            id: row.id,
            name: row.name,
            stage_idx: row.stage_idx,
            status: parse_status(&row.status)?,
            allow_failure: row.allow_failure,
            lock_version: row.lock_version,
            processed: row.processed,
        })
    }
}
