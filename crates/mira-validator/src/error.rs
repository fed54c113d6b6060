use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("store error: {0}")]
    Store(#[from] mira_store::StoreError),
    #[error("budget error: {0}")]
    Budget(#[from] mira_budget::BudgetError),
    #[error("oracle error: {0}")]
    Oracle(#[from] mira_types::OracleError),
    #[error("oracle returned malformed JSON: {0}")]
    MalformedResponse(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;
