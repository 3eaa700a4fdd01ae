//! Job persistence
//!
//! Every status write is a compare-and-swap on the current status, so a row
//! that reached a terminal state can never be rewritten. Creation is a single
//! conditional insert backed by the `idx_jobs_one_active` partial unique
//! index: of two concurrent starts for one project, exactly one succeeds.

use super::{curricula, max_lock_wait_ms, parse_optional_timestamp, parse_timestamp, parse_uuid, projects, technologies};
use crate::models::{
    CurriculumStatus, CurriculumStructure, FailureReason, Job, JobKind, JobStatus, LearningModule, Technology,
    TokenUsage,
};
use crate::utils::retry_on_lock;
use chrono::Utc;
use curio_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, project_id, kind, status, backend_name, model_name, \
     input_tokens, output_tokens, error_message, failure_reason, \
     created_at, started_at, completed_at";

/// Insert a pending job unless the project already has an active one
///
/// Returns `false` when the project already has a `pending` or `processing`
/// job.
pub async fn create_job(pool: &SqlitePool, job: &Job) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO jobs (id, project_id, kind, status, backend_name, model_name, created_at)
        SELECT ?, ?, ?, 'pending', ?, ?, ?
        WHERE NOT EXISTS (
            SELECT 1 FROM jobs
            WHERE project_id = ? AND status IN ('pending', 'processing')
        )
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.project_id.to_string())
    .bind(job.kind.as_str())
    .bind(&job.backend_name)
    .bind(&job.model_name)
    .bind(job.created_at.to_rfc3339())
    .bind(job.project_id.to_string())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.rows_affected() == 1),
        // A concurrent insert won the race between the check and the write
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
        Err(e) => Err(Error::Database(e)),
    }
}

pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<Job>> {
    let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| job_from_row(&row)).transpose()
}

/// Most recent job of `kind` for a project
pub async fn latest_job(pool: &SqlitePool, project_id: Uuid, kind: JobKind) -> Result<Option<Job>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM jobs WHERE project_id = ? AND kind = ? ORDER BY created_at DESC LIMIT 1",
        JOB_COLUMNS
    ))
    .bind(project_id.to_string())
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|row| job_from_row(&row)).transpose()
}

/// `pending -> processing`; `false` if the job was no longer pending
pub async fn mark_processing(pool: &SqlitePool, job_id: Uuid) -> Result<bool> {
    let id = job_id.to_string();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("mark_job_processing", max_wait_ms, || async {
        let done = sqlx::query(
            "UPDATE jobs SET status = 'processing', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(done.rows_affected() == 1)
    })
    .await
}

/// `processing -> completed` with the job's token telemetry
pub async fn mark_completed(pool: &SqlitePool, job_id: Uuid, usage: TokenUsage) -> Result<bool> {
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("mark_job_completed", max_wait_ms, || async {
        let mut conn = pool.acquire().await?;
        complete_in(&mut conn, job_id, usage).await
    })
    .await
}

/// `processing -> completed` inside a caller-owned transaction
///
/// Must be the first write of the transaction: it takes SQLite's write lock,
/// so no concurrent `mark_failed` can interleave with the result writes.
async fn complete_in(conn: &mut SqliteConnection, job_id: Uuid, usage: TokenUsage) -> Result<bool> {
    let done = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'completed', input_tokens = ?, output_tokens = ?, completed_at = ?
        WHERE id = ? AND status = 'processing'
        "#,
    )
    .bind(usage.input_tokens as i64)
    .bind(usage.output_tokens as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(job_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(done.rows_affected() == 1)
}

/// Complete an analysis job and write its results atomically
///
/// Returns the newly recorded technology names, or `None` when the job was
/// no longer `processing` (nothing is written).
pub async fn commit_analysis(
    pool: &SqlitePool,
    job: &Job,
    usage: TokenUsage,
    records: &[Technology],
    summary: &str,
) -> Result<Option<Vec<String>>> {
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("commit_analysis", max_wait_ms, || async {
        let mut tx = pool.begin().await?;
        if !complete_in(&mut tx, job.id, usage).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        let new_names = technologies::upsert_technologies_in(&mut tx, job.project_id, records).await?;
        projects::mark_analyzed_in(&mut tx, job.project_id, summary).await?;
        tx.commit().await?;
        Ok(Some(new_names))
    })
    .await
}

/// Complete a curriculum job, store its modules and mark the curriculum ready
///
/// Returns `false` when the job was no longer `processing` (nothing is
/// written).
pub async fn commit_curriculum(
    pool: &SqlitePool,
    job: &Job,
    usage: TokenUsage,
    structure: &CurriculumStructure,
    modules: &[LearningModule],
) -> Result<bool> {
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("commit_curriculum", max_wait_ms, || async {
        let mut tx = pool.begin().await?;
        if !complete_in(&mut tx, job.id, usage).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        curricula::store_curriculum_in(&mut tx, job.project_id, structure, modules).await?;
        projects::set_curriculum_status_in(&mut tx, job.project_id, CurriculumStatus::Ready).await?;
        tx.commit().await?;
        Ok(true)
    })
    .await
}

/// `pending|processing -> failed`; `false` if the job was already terminal
pub async fn mark_failed(
    pool: &SqlitePool,
    job_id: Uuid,
    reason: FailureReason,
    message: &str,
    usage: TokenUsage,
) -> Result<bool> {
    let id = job_id.to_string();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("mark_job_failed", max_wait_ms, || async {
        let done = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', failure_reason = ?, error_message = ?,
                input_tokens = ?, output_tokens = ?, completed_at = ?
            WHERE id = ? AND status IN ('pending', 'processing')
            "#,
        )
        .bind(reason.as_str())
        .bind(message)
        .bind(usage.input_tokens as i64)
        .bind(usage.output_tokens as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(done.rows_affected() == 1)
    })
    .await
}

/// Fail every job left non-terminal by a previous process
///
/// Returns the failed jobs so their projects can be mirrored to `error`.
pub async fn fail_interrupted_jobs(pool: &SqlitePool) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM jobs WHERE status IN ('pending', 'processing')",
        JOB_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let mut interrupted = Vec::with_capacity(rows.len());
    for row in &rows {
        let job = job_from_row(row)?;
        if mark_failed(
            pool,
            job.id,
            FailureReason::Internal,
            "interrupted by restart",
            job.usage,
        )
        .await?
        {
            interrupted.push(job);
        }
    }

    Ok(interrupted)
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let failure_reason: Option<String> = row.get("failure_reason");
    let created_at: String = row.get("created_at");
    let input_tokens: i64 = row.get("input_tokens");
    let output_tokens: i64 = row.get("output_tokens");

    Ok(Job {
        id: parse_uuid(row.get("id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        kind: JobKind::parse(&kind)
            .ok_or_else(|| Error::Internal(format!("Unknown job kind '{}'", kind)))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown job status '{}'", status)))?,
        backend_name: row.get("backend_name"),
        model_name: row.get("model_name"),
        usage: TokenUsage::new(input_tokens.max(0) as u64, output_tokens.max(0) as u64),
        error_message: row.get("error_message"),
        failure_reason: failure_reason.as_deref().and_then(FailureReason::parse),
        created_at: parse_timestamp(&created_at)?,
        started_at: parse_optional_timestamp(row.get("started_at"))?,
        completed_at: parse_optional_timestamp(row.get("completed_at"))?,
    })
}
