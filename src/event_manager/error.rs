use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventManagerError {
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Can't accept outgoing transfer")]
    TransferAcceptOutgoing,

    #[error("Can't accept already accepted transfer")]
    TransferAlreadyAccepted,

    #[error("Transfer was canceled by peer")]
    TransferCanceledByPeer,

    #[error("Transfer was canceled")]
    TransferCanceledByUs,

    #[error("Accept directory not found")]
    AcceptDirNotFound,

    #[error("Accept directory is a symlink")]
    AcceptDirIsASymlink,

    #[error("Accept directory is not a directory")]
    AcceptDirIsNotADirectory,

    #[error("No permissions to write to accept directory")]
    NoPermissionsToAcceptDirectory,

    #[error("Provided size limit exceeded")]
    SizeLimitExceeded,

    #[error("Notifications already enabled")]
    NotificationsAlreadyEnabled,

    #[error("Notifications already disabled")]
    NotificationsAlreadyDisabled,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EventManagerResult<T> = Result<T, EventManagerError>;
