use std::sync::Arc;
use std::time::Duration;

use mira_queue::{ClaimedJob, JobQueue};
use mira_telemetry::{CorrelationContext, Logger};
use mira_types::JobType;
use serde_json::json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::handler::{HandlerError, JobHandler};

/// Default sleep between empty claims for a job type (spec.md §4.6).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// In-flight handlers get this long to finish after `stop()` before the
/// pool stops waiting on them; their leases expire and the jobs are
/// reclaimed by whichever worker claims next (spec.md §4.6).
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

struct Registration {
    job_type: JobType,
    handler: Arc<dyn JobHandler>,
    lease: Duration,
    concurrency: usize,
}

/// Long-running executor of jobs with graceful lifecycle and per-type
/// handler registration (spec.md §4.6). Holds no state of its own beyond
/// the queue handle and the handler registrations; all durable state lives
/// in the store behind `JobQueue`.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    registrations: Vec<Registration>,
    poll_interval: Duration,
    logger: Option<Logger>,
}

impl WorkerPool {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue: Arc::new(queue), registrations: Vec::new(), poll_interval: DEFAULT_POLL_INTERVAL, logger: None }
    }

    #[cfg(test)]
    pub fn with_poll_interval(queue: JobQueue, poll_interval: Duration) -> Self {
        Self { queue: Arc::new(queue), registrations: Vec::new(), poll_interval, logger: None }
    }

    /// Attaches a telemetry sink; once set, every claim/complete/fail
    /// transition emits the matching allowlisted event (spec.md §4.8).
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Registers a handler for `job_type`; `run()` later spawns `concurrency`
    /// independent claim loops for it, each leasing for `lease_seconds`.
    pub fn register(
        &mut self,
        job_type: JobType,
        handler: Arc<dyn JobHandler>,
        lease_seconds: u64,
        concurrency: usize,
    ) {
        self.registrations.push(Registration {
            job_type,
            handler,
            lease: Duration::from_secs(lease_seconds),
            concurrency: concurrency.max(1),
        });
    }

    /// Spawns every registered claim loop and blocks until `shutdown` is
    /// cancelled, then waits up to the grace period for in-flight handlers
    /// to finish before returning (spec.md §4.6).
    pub async fn run(self, shutdown: CancellationToken) {
        let mut tasks = JoinSet::new();

        for reg in self.registrations {
            for worker_index in 0..reg.concurrency {
                let queue = self.queue.clone();
                let handler = reg.handler.clone();
                let job_type = reg.job_type;
                let lease = reg.lease;
                let poll_interval = self.poll_interval;
                let token = shutdown.clone();
                let logger = self.logger.clone();
                tasks.spawn(async move {
                    info!(job_type = job_type.as_str(), worker_index, "worker loop starting");
                    claim_loop(queue, job_type, handler, lease, poll_interval, token, logger).await;
                    info!(job_type = job_type.as_str(), worker_index, "worker loop stopped");
                });
            }
        }

        shutdown.cancelled().await;
        info!("shutdown requested, waiting up to grace period for in-flight jobs");

        let grace = tokio::time::sleep(SHUTDOWN_GRACE_PERIOD);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                _ = &mut grace => {
                    warn!("shutdown grace period elapsed, abandoning in-flight handlers");
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
            }
        }
    }
}

async fn claim_loop(
    queue: Arc<JobQueue>,
    job_type: JobType,
    handler: Arc<dyn JobHandler>,
    lease: Duration,
    poll_interval: Duration,
    shutdown: CancellationToken,
    logger: Option<Logger>,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let claimed = tokio::select! {
            result = queue.claim(job_type, lease) => result,
            _ = shutdown.cancelled() => return,
        };

        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Err(e) => {
                error!(job_type = job_type.as_str(), error = %e, "failed to claim job, backing off");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        run_one(&queue, &handler, job, logger.as_ref()).await;
    }
}

/// Runs a single claimed job on its own task so a handler panic surfaces as
/// a `JoinError` rather than taking down the claim loop (spec.md §4.6:
/// "panics/exceptions are caught and mapped to `fail`").
async fn run_one(queue: &JobQueue, handler: &Arc<dyn JobHandler>, job: ClaimedJob, logger: Option<&Logger>) {
    let ctx = CorrelationContext::root();
    if let Some(logger) = logger {
        logger.info(&ctx, "job_claimed", obj(&[("job_type", json!(job.job_type.as_str())), ("job_id", json!(job.id.as_str()))]));
    }

    let handler = handler.clone();
    let payload = job.payload.clone();
    let outcome = tokio::spawn(async move { handler.handle(payload).await }).await;

    match outcome {
        Ok(Ok(result)) => {
            if let Err(e) = queue.complete(&job.id, &result).await {
                error!(job_id = %job.id, error = %e, "failed to mark job complete");
            }
            if let Some(logger) = logger {
                logger.info(&ctx, "job_completed", obj(&[("job_type", json!(job.job_type.as_str())), ("job_id", json!(job.id.as_str()))]));
            }
        }
        Ok(Err(HandlerError::BudgetExhausted { resume_at })) => {
            if let Err(e) = queue.pause_for_budget(&job.id, resume_at).await {
                error!(job_id = %job.id, error = %e, "failed to pause job for budget");
            }
            if let Some(logger) = logger {
                logger.warn(
                    &ctx,
                    "job_failed",
                    obj(&[
                        ("job_type", json!(job.job_type.as_str())),
                        ("job_id", json!(job.id.as_str())),
                        ("error", json!("budget")),
                    ]),
                );
            }
        }
        Ok(Err(HandlerError::PolicyViolation(reason))) => {
            warn!(job_id = %job.id, reason, "job failed policy check, dead-lettering without retry");
            if let Err(e) = queue.dead_letter_immediately(&job.id, &reason).await {
                error!(job_id = %job.id, error = %e, "failed to dead-letter job");
            }
            if let Some(logger) = logger {
                logger.warn(
                    &ctx,
                    "job_failed",
                    obj(&[
                        ("job_type", json!(job.job_type.as_str())),
                        ("job_id", json!(job.id.as_str())),
                        ("error", json!(reason)),
                        ("dead_lettered", json!(true)),
                    ]),
                );
            }
        }
        Ok(Err(HandlerError::Failed(reason))) => {
            let dead_lettered = match queue.fail(&job.id, &reason).await {
                Ok(outcome) => outcome == mira_queue::FailOutcome::DeadLettered,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "failed to record job failure");
                    false
                }
            };
            if let Some(logger) = logger {
                logger.warn(
                    &ctx,
                    "job_failed",
                    obj(&[
                        ("job_type", json!(job.job_type.as_str())),
                        ("job_id", json!(job.id.as_str())),
                        ("error", json!(reason)),
                        ("dead_lettered", json!(dead_lettered)),
                    ]),
                );
            }
        }
        Err(join_err) => {
            let reason = format!("handler panicked: {join_err}");
            error!(job_id = %job.id, %reason, "job handler panicked");
            let dead_lettered = match queue.fail(&job.id, &reason).await {
                Ok(outcome) => outcome == mira_queue::FailOutcome::DeadLettered,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "failed to record job failure");
                    false
                }
            };
            if let Some(logger) = logger {
                logger.warn(
                    &ctx,
                    "job_failed",
                    obj(&[
                        ("job_type", json!(job.job_type.as_str())),
                        ("job_id", json!(job.id.as_str())),
                        ("error", json!(reason)),
                        ("dead_lettered", json!(dead_lettered)),
                    ]),
                );
            }
        }
    }
}

fn obj(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}
