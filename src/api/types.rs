use crate::service::{AcceptRequest, SendRequest, SetNotificationsStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptBody {
    pub dst_path: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelFileBody {
    /// File ID or display path
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNotificationsRequest {
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNotificationsResponse {
    pub status: SetNotificationsStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Streaming calls accepted on the client WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    Send(SendRequest),
    Accept(AcceptRequest),
}
