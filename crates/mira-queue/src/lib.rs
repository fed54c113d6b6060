//! Durable, lease-based, at-least-once job queue. Claim ordering and
//! state transitions are the entirety of spec.md §4.5; everything else
//! lives in `mira-store::jobs`.

mod backoff;
mod error;
mod queue;

pub use backoff::backoff;
pub use error::{QueueError, QueueResult};
pub use mira_store::jobs::FailOutcome;
pub use queue::{idempotency_key, ClaimedJob, EnqueueOptions, JobQueue};
