use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] mira_store::StoreError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("invalid job state transition for {job_id}: {from} -> {to}")]
    InvalidTransition { job_id: String, from: String, to: String },
}

pub type QueueResult<T> = Result<T, QueueError>;
