use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("store error: {0}")]
    Store(#[from] mira_store::StoreError),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("daily limit exceeded: would reach {would_spend_cents} of {limit_cents} cents")]
    DailyLimitExceeded { would_spend_cents: i64, limit_cents: i64 },
    #[error("monthly limit exceeded: would reach {would_spend_cents} of {limit_cents} cents")]
    MonthlyLimitExceeded { would_spend_cents: i64, limit_cents: i64 },
    #[error("per-operation limit exceeded: {estimated_cents} of {limit_cents} cents")]
    PerOperationLimitExceeded { estimated_cents: i64, limit_cents: i64 },
}

pub type BudgetResult<T> = Result<T, BudgetError>;
