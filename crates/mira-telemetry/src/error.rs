use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Store(#[from] mira_store::StoreError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
