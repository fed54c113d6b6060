use chrono::Utc;
use mira_types::{Id, JobStatus, JobType};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub job_type: String,
    pub payload: String,
    pub status: String,
    pub priority: i64,
    pub attempts: i64,
    pub max_attempts: i64,
    pub idempotency_key: Option<String>,
    pub scheduled_at: String,
    pub lease_expires_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
    pub result: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewJob<'a> {
    pub job_type: JobType,
    pub payload_json: &'a str,
    pub priority: i64,
    pub scheduled_at: &'a str,
    pub idempotency_key: Option<&'a str>,
    pub max_attempts: i64,
}

pub async fn fetch_by_idempotency_key(
    tx: &mut Tx<'_>,
    idempotency_key: &str,
) -> StoreResult<Option<JobRow>> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"SELECT id, type, payload, status, priority, attempts, max_attempts,
                  idempotency_key, scheduled_at, lease_expires_at, started_at,
                  completed_at, error, result, created_at, updated_at
           FROM job_queue WHERE idempotency_key = ?"#,
    )
    .bind(idempotency_key)
    .fetch_optional(&mut *tx.tx)
    .await?;
    Ok(row)
}

pub async fn fetch_by_id(tx: &mut Tx<'_>, id: &str) -> StoreResult<Option<JobRow>> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"SELECT id, type, payload, status, priority, attempts, max_attempts,
                  idempotency_key, scheduled_at, lease_expires_at, started_at,
                  completed_at, error, result, created_at, updated_at
           FROM job_queue WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(&mut *tx.tx)
    .await?;
    Ok(row)
}

/// Inserts a job. A duplicate `idempotency_key` is a no-op that returns
/// the existing row (spec.md §4.5).
pub async fn insert(tx: &mut Tx<'_>, job: NewJob<'_>) -> StoreResult<JobRow> {
    if let Some(key) = job.idempotency_key {
        if let Some(existing) = fetch_by_idempotency_key(tx, key).await? {
            return Ok(existing);
        }
    }

    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO job_queue (
            id, type, payload, status, priority, attempts, max_attempts,
            idempotency_key, scheduled_at, lease_expires_at, started_at,
            completed_at, error, result, created_at, updated_at
        ) VALUES (?, ?, ?, 'queued', ?, 0, ?, ?, ?, NULL, NULL, NULL, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(job.job_type.as_str())
    .bind(job.payload_json)
    .bind(job.priority)
    .bind(job.max_attempts)
    .bind(job.idempotency_key)
    .bind(job.scheduled_at)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    fetch_by_id(tx, &id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("job {id}")))
}

/// Returns any `in_progress` job of `job_type` whose lease has expired to
/// `queued`, clearing its lease. Called before every `claim` (spec.md §4.5).
pub async fn reap_expired_leases(tx: &mut Tx<'_>, job_type: JobType, now: &str) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE job_queue
        SET status = 'queued', lease_expires_at = NULL, started_at = NULL, updated_at = ?
        WHERE type = ? AND status = 'in_progress' AND lease_expires_at < ?
        "#,
    )
    .bind(now)
    .bind(job_type.as_str())
    .bind(now)
    .execute(&mut *tx.tx)
    .await?;
    Ok(result.rows_affected())
}

/// Atomically selects the oldest claimable `queued` job of `job_type` and
/// marks it `in_progress` with a fresh lease. Ordering is
/// `(priority ASC, created_at ASC)` (spec.md §4.5).
pub async fn claim(
    tx: &mut Tx<'_>,
    job_type: JobType,
    now: &str,
    lease_expires_at: &str,
) -> StoreResult<Option<JobRow>> {
    let candidate: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM job_queue
        WHERE type = ? AND status = 'queued' AND scheduled_at <= ?
        ORDER BY priority ASC, created_at ASC
        LIMIT 1
        "#,
    )
    .bind(job_type.as_str())
    .bind(now)
    .fetch_optional(&mut *tx.tx)
    .await?;

    let Some((id,)) = candidate else {
        return Ok(None);
    };

    let result = sqlx::query(
        r#"
        UPDATE job_queue
        SET status = 'in_progress', started_at = ?, lease_expires_at = ?, updated_at = ?
        WHERE id = ? AND status = 'queued'
        "#,
    )
    .bind(now)
    .bind(lease_expires_at)
    .bind(now)
    .bind(&id)
    .execute(&mut *tx.tx)
    .await?;

    if result.rows_affected() == 0 {
        // Lost the race to another claimer between SELECT and UPDATE.
        return Ok(None);
    }

    fetch_by_id(tx, &id).await
}

pub async fn complete(tx: &mut Tx<'_>, id: &str, result_json: Option<&str>) -> StoreResult<()> {
    let now = Utc::now().to_rfc3339();
    let rows = sqlx::query(
        r#"
        UPDATE job_queue
        SET status = 'completed', result = ?, completed_at = ?, lease_expires_at = NULL, updated_at = ?
        WHERE id = ? AND status = 'in_progress'
        "#,
    )
    .bind(result_json)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(&mut *tx.tx)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(StoreError::Constraint(format!(
            "job {id} is not in_progress; refusing invalid transition to completed"
        )));
    }
    Ok(())
}

/// Result of a `fail` call: whether the job was requeued or dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Requeued,
    DeadLettered,
}

/// Fails an in-progress job. Transitions to `dead_letter` once
/// `attempts + 1 >= max_attempts`; otherwise increments `attempts` and
/// requeues with the backoff-computed `scheduled_at` (spec.md §4.5).
pub async fn fail(
    tx: &mut Tx<'_>,
    id: &str,
    error: &str,
    next_scheduled_at: &str,
) -> StoreResult<FailOutcome> {
    let job = fetch_by_id(tx, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;

    if job.status != JobStatus::InProgress.as_str() {
        return Err(StoreError::Constraint(format!(
            "job {id} is not in_progress; refusing invalid transition"
        )));
    }

    let now = Utc::now().to_rfc3339();
    let attempts = job.attempts + 1;

    if attempts >= job.max_attempts {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'dead_letter', attempts = ?, error = ?, lease_expires_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(attempts)
        .bind(error)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx.tx)
        .await?;
        Ok(FailOutcome::DeadLettered)
    } else {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'queued', attempts = ?, error = ?, scheduled_at = ?,
                lease_expires_at = NULL, started_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(attempts)
        .bind(error)
        .bind(next_scheduled_at)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx.tx)
        .await?;
        Ok(FailOutcome::Requeued)
    }
}

/// Transitions an in-progress job straight to `dead_letter` with no retry,
/// for failures that are never transient (spec.md §7 `PolicyViolation`).
pub async fn dead_letter_immediately(tx: &mut Tx<'_>, id: &str, error: &str) -> StoreResult<()> {
    let now = Utc::now().to_rfc3339();
    let rows = sqlx::query(
        r#"
        UPDATE job_queue
        SET status = 'dead_letter', error = ?, lease_expires_at = NULL, updated_at = ?
        WHERE id = ? AND status = 'in_progress'
        "#,
    )
    .bind(error)
    .bind(&now)
    .bind(id)
    .execute(&mut *tx.tx)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(StoreError::Constraint(format!(
            "job {id} is not in_progress; refusing invalid transition to dead_letter"
        )));
    }
    Ok(())
}

pub async fn count_by_status(tx: &mut Tx<'_>, job_type: JobType, status: JobStatus) -> StoreResult<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM job_queue WHERE type = ? AND status = ?",
    )
    .bind(job_type.as_str())
    .bind(status.as_str())
    .fetch_one(&mut *tx.tx)
    .await?;
    Ok(count.0)
}
