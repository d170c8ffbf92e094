use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TempoError {
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TempoResult<T> = Result<T, TempoError>;
