use crate::engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("History file not found: {0}")]
    NotFound(String),

    #[error("Engine history error: {0}")]
    Engine(#[from] EngineError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
