use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine call failed: {0}")]
    Library(String),

    #[error("Malformed engine event: {0}")]
    MalformedEvent(String),

    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
