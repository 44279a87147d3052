use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct JobRun {
    pub id: i32,
    pub job_name: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub items_processed: Option<i32>,
    pub items_failed: Option<i32>,
    pub duration_ms: Option<i64>,
}

pub async fn record_job_start(pool: &PgPool, job_name: &str) -> Result<i32, sqlx::Error> {
    let row: (i32,) = sqlx::query_as(
        r#"
        INSERT INTO job_runs (job_name, status)
        VALUES ($1, 'running')
        RETURNING id
        "#,
    )
    .bind(job_name)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub async fn record_job_success(
    pool: &PgPool,
    job_id: i32,
    items_processed: i32,
    items_failed: i32,
    duration_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'success',
            items_processed = $2,
            items_failed = $3,
            duration_ms = $4
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(items_processed)
    .bind(items_failed)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_job_failure(
    pool: &PgPool,
    job_id: i32,
    error_message: &str,
    duration_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'failed',
            error_message = $2,
            duration_ms = $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error_message)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_recent_runs(pool: &PgPool) -> Result<Vec<JobRun>, sqlx::Error> {
    sqlx::query_as::<_, JobRun>(
        r#"
        SELECT id,
               job_name,
               started_at::TEXT AS started_at,
               completed_at::TEXT AS completed_at,
               status,
               error_message,
               items_processed,
               items_failed,
               duration_ms
        FROM job_runs
        ORDER BY started_at DESC
        LIMIT 50
        "#,
    )
    .fetch_all(pool)
    .await
}
