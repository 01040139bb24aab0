use crate::engine::error::{EngineError, EngineResult};
use crate::transfer::{File, Status};
use serde::{Deserialize, Serialize};

/// Status codes reported by the engine for failed files and transfers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "u32", into = "u32")]
pub enum StatusCode {
    Finalized,
    BadPath,
    BadFile,
    BadTransfer,
    BadTransferState,
    BadFileId,
    IoError,
    TransferLimitsExceeded,
    MismatchedSize,
    InvalidArgument,
    AddrInUse,
    FileModified,
    FilenameTooLong,
    AuthenticationFailed,
    StorageError,
    DbLost,
    FileChecksumMismatch,
    FileRejected,
    FileFailed,
    FileFinished,
    EmptyTransfer,
    ConnectionClosedByPeer,
    TooManyRequests,
    PermissionDenied,
    Other(u32),
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        match code {
            1 => StatusCode::Finalized,
            2 => StatusCode::BadPath,
            3 => StatusCode::BadFile,
            4 => StatusCode::BadTransfer,
            5 => StatusCode::BadTransferState,
            6 => StatusCode::BadFileId,
            7 => StatusCode::IoError,
            8 => StatusCode::TransferLimitsExceeded,
            9 => StatusCode::MismatchedSize,
            10 => StatusCode::InvalidArgument,
            11 => StatusCode::AddrInUse,
            12 => StatusCode::FileModified,
            13 => StatusCode::FilenameTooLong,
            14 => StatusCode::AuthenticationFailed,
            15 => StatusCode::StorageError,
            16 => StatusCode::DbLost,
            17 => StatusCode::FileChecksumMismatch,
            18 => StatusCode::FileRejected,
            19 => StatusCode::FileFailed,
            20 => StatusCode::FileFinished,
            21 => StatusCode::EmptyTransfer,
            22 => StatusCode::ConnectionClosedByPeer,
            23 => StatusCode::TooManyRequests,
            24 => StatusCode::PermissionDenied,
            other => StatusCode::Other(other),
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Finalized => 1,
            StatusCode::BadPath => 2,
            StatusCode::BadFile => 3,
            StatusCode::BadTransfer => 4,
            StatusCode::BadTransferState => 5,
            StatusCode::BadFileId => 6,
            StatusCode::IoError => 7,
            StatusCode::TransferLimitsExceeded => 8,
            StatusCode::MismatchedSize => 9,
            StatusCode::InvalidArgument => 10,
            StatusCode::AddrInUse => 11,
            StatusCode::FileModified => 12,
            StatusCode::FilenameTooLong => 13,
            StatusCode::AuthenticationFailed => 14,
            StatusCode::StorageError => 15,
            StatusCode::DbLost => 16,
            StatusCode::FileChecksumMismatch => 17,
            StatusCode::FileRejected => 18,
            StatusCode::FileFailed => 19,
            StatusCode::FileFinished => 20,
            StatusCode::EmptyTransfer => 21,
            StatusCode::ConnectionClosedByPeer => 22,
            StatusCode::TooManyRequests => 23,
            StatusCode::PermissionDenied => 24,
            StatusCode::Other(code) => code,
        }
    }
}

impl StatusCode {
    pub fn to_status(self) -> Status {
        match self {
            StatusCode::Finalized => Status::Canceled,
            StatusCode::BadPath => Status::BadPath,
            StatusCode::BadFile => Status::BadFile,
            StatusCode::BadTransfer => Status::BadTransfer,
            StatusCode::BadTransferState => Status::BadTransferState,
            StatusCode::BadFileId => Status::BadFileId,
            StatusCode::IoError => Status::Io,
            StatusCode::TransferLimitsExceeded => Status::TransferLimitsExceeded,
            StatusCode::MismatchedSize => Status::MismatchedSize,
            StatusCode::InvalidArgument => Status::InvalidArgument,
            StatusCode::AddrInUse => Status::AddrInUse,
            StatusCode::FileModified => Status::FileModified,
            StatusCode::FilenameTooLong => Status::FilenameTooLong,
            StatusCode::AuthenticationFailed => Status::AuthenticationFailed,
            StatusCode::StorageError => Status::StorageError,
            StatusCode::DbLost => Status::DbLost,
            StatusCode::FileChecksumMismatch => Status::FileChecksumMismatch,
            StatusCode::FileRejected => Status::FileRejected,
            StatusCode::FileFailed => Status::FileFailed,
            StatusCode::FileFinished => Status::FileFinished,
            StatusCode::EmptyTransfer => Status::EmptyTransfer,
            StatusCode::ConnectionClosedByPeer => Status::TransferClosedByPeer,
            StatusCode::TooManyRequests => Status::TooManyRequests,
            StatusCode::PermissionDenied => Status::PermissionDenied,
            StatusCode::Other(_) => Status::BadStatus,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatus {
    pub status: StatusCode,
    #[serde(default)]
    pub os_error_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceivedFile {
    pub id: String,
    #[serde(default)]
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuedFile {
    pub id: String,
    #[serde(default)]
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub base_dir: Option<String>,
}

impl From<&ReceivedFile> for File {
    fn from(received: &ReceivedFile) -> Self {
        let mut file = File::new(received.id.clone(), received.size);
        if !received.path.is_empty() {
            file.path = received.path.clone();
        }
        file
    }
}

/// Events pushed by the engine through its callback.
///
/// Every kind the engine documents has its own variant, `Unknown` only carries kinds
/// introduced by newer engine versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    RequestReceived {
        #[serde(rename = "transfer")]
        transfer_id: String,
        peer: String,
        files: Vec<ReceivedFile>,
    },
    RequestQueued {
        #[serde(rename = "transfer")]
        transfer_id: String,
        peer: String,
        files: Vec<QueuedFile>,
    },
    FileStarted {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
        #[serde(default)]
        transferred: u64,
    },
    FileProgress {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
        transferred: u64,
    },
    FileDownloaded {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
        final_path: String,
    },
    FileUploaded {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
    },
    FileRejected {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
        #[serde(default)]
        by_peer: bool,
    },
    FileFailed {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(rename = "file")]
        file_id: String,
        status: EngineStatus,
    },
    TransferFailed {
        #[serde(rename = "transfer")]
        transfer_id: String,
        status: EngineStatus,
    },
    TransferFinalized {
        #[serde(rename = "transfer")]
        transfer_id: String,
        #[serde(default)]
        by_peer: bool,
    },
    #[serde(skip)]
    Unknown(String),
}

const KNOWN_KINDS: &[&str] = &[
    "RequestReceived",
    "RequestQueued",
    "FileStarted",
    "FileProgress",
    "FileDownloaded",
    "FileUploaded",
    "FileRejected",
    "FileFailed",
    "TransferFailed",
    "TransferFinalized",
];

impl EngineEvent {
    /// Parse the JSON payload handed to the engine event callback
    pub fn from_json(payload: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EngineError::MalformedEvent("missing event type".into()))?;

        if !KNOWN_KINDS.contains(&kind) {
            return Ok(EngineEvent::Unknown(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| EngineError::MalformedEvent(e.to_string()))
    }

    pub fn transfer_id(&self) -> Option<&str> {
        match self {
            EngineEvent::RequestReceived { transfer_id, .. }
            | EngineEvent::RequestQueued { transfer_id, .. }
            | EngineEvent::FileStarted { transfer_id, .. }
            | EngineEvent::FileProgress { transfer_id, .. }
            | EngineEvent::FileDownloaded { transfer_id, .. }
            | EngineEvent::FileUploaded { transfer_id, .. }
            | EngineEvent::FileRejected { transfer_id, .. }
            | EngineEvent::FileFailed { transfer_id, .. }
            | EngineEvent::TransferFailed { transfer_id, .. }
            | EngineEvent::TransferFinalized { transfer_id, .. } => Some(transfer_id),
            EngineEvent::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            EngineEvent::RequestReceived { .. } => "RequestReceived",
            EngineEvent::RequestQueued { .. } => "RequestQueued",
            EngineEvent::FileStarted { .. } => "FileStarted",
            EngineEvent::FileProgress { .. } => "FileProgress",
            EngineEvent::FileDownloaded { .. } => "FileDownloaded",
            EngineEvent::FileUploaded { .. } => "FileUploaded",
            EngineEvent::FileRejected { .. } => "FileRejected",
            EngineEvent::FileFailed { .. } => "FileFailed",
            EngineEvent::TransferFailed { .. } => "TransferFailed",
            EngineEvent::TransferFinalized { .. } => "TransferFinalized",
            EngineEvent::Unknown(kind) => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_received() {
        let payload = r#"{
            "type": "RequestReceived",
            "data": {
                "peer": "172.20.0.5",
                "transfer": "c13c619c-c70b-49b8-9396-72de88155c43",
                "files": [{"id": "testfile", "size": 1048576}]
            }
        }"#;

        let event = EngineEvent::from_json(payload).unwrap();
        match event {
            EngineEvent::RequestReceived {
                transfer_id,
                peer,
                files,
            } => {
                assert_eq!(transfer_id, "c13c619c-c70b-49b8-9396-72de88155c43");
                assert_eq!(peer, "172.20.0.5");
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].size, 1048576);
            }
            other => panic!("Unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_file_failed_status() {
        let payload = r#"{
            "type": "FileFailed",
            "data": {"transfer": "t1", "file": "a", "status": {"status": 17}}
        }"#;

        let event = EngineEvent::from_json(payload).unwrap();
        assert_eq!(
            event,
            EngineEvent::FileFailed {
                transfer_id: "t1".into(),
                file_id: "a".into(),
                status: EngineStatus {
                    status: StatusCode::FileChecksumMismatch,
                    os_error_code: None,
                },
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let event = EngineEvent::from_json(r#"{"type": "RuntimeError", "data": {}}"#).unwrap();
        assert_eq!(event, EngineEvent::Unknown("RuntimeError".into()));
        assert!(event.transfer_id().is_none());
    }

    #[test]
    fn test_malformed_known_kind() {
        let result = EngineEvent::from_json(r#"{"type": "FileProgress", "data": {}}"#);
        assert!(matches!(result, Err(EngineError::MalformedEvent(_))));

        let result = EngineEvent::from_json("not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(StatusCode::from(1).to_status(), Status::Canceled);
        assert_eq!(StatusCode::from(17).to_status(), Status::FileChecksumMismatch);
        assert_eq!(StatusCode::from(999), StatusCode::Other(999));
        assert_eq!(u32::from(StatusCode::PermissionDenied), 24);
    }
}
