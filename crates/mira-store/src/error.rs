use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Extension trait mirroring the backend's `IntoGitErrorResult` pattern:
/// attach context to a foreign error on its way into a `StoreError`.
pub trait IntoStoreErrorResult<T> {
    fn context(self, context: &str) -> StoreResult<T>;
}

impl<T, E: std::fmt::Display> IntoStoreErrorResult<T> for Result<T, E> {
    fn context(self, context: &str) -> StoreResult<T> {
        self.map_err(|e| StoreError::Constraint(format!("{context}: {e}")))
    }
}
