use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] mira_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] mira_queue::QueueError),
    #[error("budget error: {0}")]
    Budget(#[from] mira_budget::BudgetError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
