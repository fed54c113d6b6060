use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// What a handler can report back about a single job attempt (spec.md §4.6,
/// §4.7, §7). Distinguishing `BudgetExhausted` and `PolicyViolation` from a
/// plain `Failed` lets the pool apply the right queue transition — normal
/// backoff, a budget-period pause, or an unretried dead-letter — without
/// parsing error strings.
#[derive(Debug)]
pub enum HandlerError {
    Failed(String),
    BudgetExhausted { resume_at: DateTime<Utc> },
    PolicyViolation(String),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Failed(msg) => write!(f, "{msg}"),
            HandlerError::BudgetExhausted { .. } => write!(f, "budget"),
            HandlerError::PolicyViolation(msg) => write!(f, "policy violation: {msg}"),
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerError>;

/// Per-job-type unit of work the pool drives (spec.md §4.6). Implementations
/// must be idempotent on their declared idempotency key: the pool retries a
/// handler with the same payload after a transient failure or a process
/// crash mid-lease.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: serde_json::Value) -> HandlerResult;
}

/// Next UTC midnight strictly after `now` — the budget period boundary a
/// budget-exhausted job is rescheduled to (spec.md §4.7).
pub fn next_daily_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_daily_boundary_is_midnight_tomorrow() {
        let now: DateTime<Utc> = "2026-07-27T15:30:00Z".parse().unwrap();
        let boundary = next_daily_boundary(now);
        assert_eq!(boundary.to_rfc3339(), "2026-07-28T00:00:00+00:00");
    }
}
