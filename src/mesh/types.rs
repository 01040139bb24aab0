use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Peer {
    pub ip: String,
    pub hostname: String,
    pub pubkey: String,
    pub identifier: String,
    pub os: String,
    pub status: PeerStatus,
    /// Peer lets us send files to it
    pub is_fileshare_allowed: bool,
    /// We accept files from the peer
    pub do_i_allow_fileshare: bool,
    /// Incoming transfers from the peer are accepted without asking
    pub always_accept_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTransferNotification {
    pub identifier: String,
    pub os: String,
    /// Set only when a single path is sent
    pub file_name: String,
    pub file_count: usize,
}
