use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the daemon itself rather than of a particular transfer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorCode {
    MeshNotEnabled,
    InternalFailure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileshareErrorCode {
    LibFailure,
    TransferNotFound,
    InvalidPeer,
    FileNotFound,
    AcceptAllFilesFailed,
    AcceptOutgoing,
    AlreadyAccepted,
    FileInvalidated,
    TransferInvalidated,
    TooManyFiles,
    DirectoryTooDeep,
    SendingNotAllowed,
    PeerDisconnected,
    FileNotInProgress,
    TransferNotCreated,
    NotEnoughSpace,
    AcceptDirNotFound,
    AcceptDirIsASymlink,
    AcceptDirIsNotADirectory,
    AcceptDirNoPermissions,
    NoFiles,
    PurgeFailure,
}

/// Error carried by every RPC response, either a service or a fileshare code
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ServiceError {
    #[error("Service error: {0:?}")]
    Service(ServiceErrorCode),

    #[error("Fileshare error: {0:?}")]
    Fileshare(FileshareErrorCode),
}

impl From<ServiceErrorCode> for ServiceError {
    fn from(code: ServiceErrorCode) -> Self {
        ServiceError::Service(code)
    }
}

impl From<FileshareErrorCode> for ServiceError {
    fn from(code: FileshareErrorCode) -> Self {
        ServiceError::Fileshare(code)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
