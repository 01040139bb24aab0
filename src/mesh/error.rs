use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Mesh service unavailable: {0}")]
    Unavailable(String),

    #[error("Mesh service error: {0}")]
    Service(String),
}

pub type MeshResult<T> = Result<T, MeshError>;
