use crate::service::error::ServiceError;
use crate::transfer::{Status, Transfer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendRequest {
    /// IP, hostname or public key of the receiving peer
    pub peer: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptRequest {
    pub transfer_id: String,
    pub dst_path: String,
    /// File IDs or directory prefixes, every file when empty
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub silent: bool,
}

/// One message of a Send or Accept stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub transfer_id: String,
    /// Percentage, only meaningful for `Ongoing`
    pub progress: u32,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ServiceError>,
}

impl StatusResponse {
    pub fn status(transfer_id: impl Into<String>, status: Status, progress: u32) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            progress,
            status,
            error: None,
        }
    }

    pub fn error(error: impl Into<ServiceError>) -> Self {
        Self {
            transfer_id: String::new(),
            progress: 0,
            status: Status::BadStatus,
            error: Some(error.into()),
        }
    }
}

/// One chunk of a List stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ServiceError>,
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetNotificationsStatus {
    SetSuccess,
    NothingToDo,
    SetFailure,
}
