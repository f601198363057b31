use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            status VARCHAR(20) NOT NULL DEFAULT 'created',
            needs_processing BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create stages table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name VARCHAR(255) NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'created',
            UNIQUE (pipeline_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create processables table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processables (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            kind VARCHAR(20) NOT NULL DEFAULT 'build',
            stage_idx INTEGER NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'created',
            lock_version INTEGER NOT NULL DEFAULT 0,
            scheduling_type VARCHAR(20) NOT NULL DEFAULT 'stage',
            needs TEXT[] NOT NULL DEFAULT '{}',
            when_condition VARCHAR(20) NOT NULL DEFAULT 'on_success',
            allow_failure BOOLEAN NOT NULL DEFAULT FALSE,
            user_id UUID,
            processed BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create exclusive leases table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_leases (
            key VARCHAR(255) PRIMARY KEY,
            token UUID NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processables_pipeline_stage ON processables(pipeline_id, stage_idx)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processables_unprocessed ON processables(pipeline_id) WHERE NOT processed",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stages_pipeline_id ON stages(pipeline_id, position)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
