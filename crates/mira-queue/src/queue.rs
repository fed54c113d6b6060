use chrono::{DateTime, Duration as ChronoDuration, Utc};
use mira_store::{jobs, Store};
use mira_types::{JobStatus, JobType};
use serde::Serialize;
use tracing::warn;

use crate::backoff::backoff;
use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub max_attempts: i64,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: 5,
            scheduled_at: None,
            idempotency_key: None,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub attempts: i64,
    pub max_attempts: i64,
}

/// Durable, lease-based FIFO-with-priority queue (spec.md §4.5). Layered
/// directly on the store's connection pool rather than a separate lock
/// manager; `claim` relies on the store's single-writer serialization to
/// guarantee at most one caller wins per call.
pub struct JobQueue {
    store: Store,
}

impl JobQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Enqueues a job. A duplicate `idempotency_key` returns the existing
    /// job's id without inserting a second row (spec.md P3).
    pub async fn enqueue<T: Serialize>(
        &self,
        job_type: JobType,
        payload: &T,
        opts: EnqueueOptions,
    ) -> QueueResult<String> {
        let payload_json = serde_json::to_string(payload)?;
        let scheduled_at = opts.scheduled_at.unwrap_or_else(Utc::now).to_rfc3339();

        let mut tx = self.store.begin().await?;
        let row = jobs::insert(
            &mut tx,
            jobs::NewJob {
                job_type,
                payload_json: &payload_json,
                priority: opts.priority,
                scheduled_at: &scheduled_at,
                idempotency_key: opts.idempotency_key.as_deref(),
                max_attempts: opts.max_attempts,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(row.id)
    }

    /// Reaps expired leases for `job_type`, then atomically claims the
    /// oldest eligible `queued` job (spec.md §4.5).
    pub async fn claim(&self, job_type: JobType, lease: std::time::Duration) -> QueueResult<Option<ClaimedJob>> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut tx = self.store.begin().await?;
        let reaped = jobs::reap_expired_leases(&mut tx, job_type, &now_str).await?;
        if reaped > 0 {
            warn!(job_type = job_type.as_str(), reaped, "reclaimed expired leases");
        }

        let lease_expires_at = (now + ChronoDuration::from_std(lease).unwrap_or(ChronoDuration::seconds(60)))
            .to_rfc3339();

        let claimed = jobs::claim(&mut tx, job_type, &now_str, &lease_expires_at).await?;
        tx.commit().await?;

        let Some(row) = claimed else {
            return Ok(None);
        };

        Ok(Some(ClaimedJob {
            id: row.id,
            job_type,
            payload: serde_json::from_str(&row.payload)?,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
        }))
    }

    pub async fn complete<T: Serialize>(&self, job_id: &str, result: &T) -> QueueResult<()> {
        let result_json = serde_json::to_string(result)?;
        let mut tx = self.store.begin().await?;
        jobs::complete(&mut tx, job_id, Some(&result_json)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fails a claimed job. Dead-letters once `attempts + 1 >= max_attempts`;
    /// otherwise requeues with jittered exponential backoff (spec.md §4.5).
    pub async fn fail(&self, job_id: &str, error: &str) -> QueueResult<jobs::FailOutcome> {
        let mut tx = self.store.begin().await?;
        let job = jobs::fetch_by_id(&mut tx, job_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;

        let next_scheduled_at = (Utc::now()
            + ChronoDuration::from_std(backoff(job.attempts)).unwrap_or(ChronoDuration::seconds(60)))
        .to_rfc3339();

        let outcome = jobs::fail(&mut tx, job_id, error, &next_scheduled_at).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Fails a job with the fixed `budget` error, scheduled to the next
    /// period boundary rather than the normal backoff curve (spec.md §4.7).
    pub async fn pause_for_budget(&self, job_id: &str, resume_at: DateTime<Utc>) -> QueueResult<()> {
        let mut tx = self.store.begin().await?;
        let job = jobs::fetch_by_id(&mut tx, job_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::InProgress.as_str() {
            return Err(QueueError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: "failed(budget)".to_string(),
            });
        }

        jobs::fail(&mut tx, job_id, "budget", &resume_at.to_rfc3339()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Dead-letters a job immediately with no retry — for failures spec.md
    /// §7 classifies as non-transient (`PolicyViolation`), where retrying
    /// with the same payload can never succeed.
    pub async fn dead_letter_immediately(&self, job_id: &str, error: &str) -> QueueResult<()> {
        let mut tx = self.store.begin().await?;
        jobs::dead_letter_immediately(&mut tx, job_id, error).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn dead_letter_count(&self, job_type: JobType) -> QueueResult<i64> {
        let mut tx = self.store.begin().await?;
        let count = jobs::count_by_status(&mut tx, job_type, JobStatus::DeadLetter).await?;
        tx.commit().await?;
        Ok(count)
    }

    pub async fn queued_count(&self, job_type: JobType) -> QueueResult<i64> {
        let mut tx = self.store.begin().await?;
        let count = jobs::count_by_status(&mut tx, job_type, JobStatus::Queued).await?;
        tx.commit().await?;
        Ok(count)
    }
}

/// Idempotency key convention the hook and extractor use:
/// `validate-<message_id>`, `learn-<message_id>`,
/// `learn-<conversation_id>-<last_message_id>` (spec.md §4.4, §4.9).
pub fn idempotency_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = prefix.to_string();
    for part in parts {
        key.push('-');
        key.push_str(part);
    }
    key
}
