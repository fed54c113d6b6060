use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error(transparent)]
    Store(#[from] mira_store::StoreError),

    #[error(transparent)]
    Budget(#[from] mira_budget::BudgetError),

    #[error("oracle call failed: {0}")]
    Oracle(#[from] mira_types::OracleError),

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("conversation {0} not found")]
    ConversationNotFound(String),
}

pub type ExtractorResult<T> = Result<T, ExtractorError>;
