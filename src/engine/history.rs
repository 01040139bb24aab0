use crate::transfer::{
    new_transfer_status, Direction, File, Status, Transfer, MULTIPLE_FILES_PATH,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Transfer record as kept in the engine's own history database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryTransfer {
    pub id: String,
    #[serde(rename = "peer_id")]
    pub peer: String,
    /// Milliseconds since the unix epoch
    pub created_at: i64,
    #[serde(default)]
    pub states: Vec<HistoryTransferState>,
    #[serde(rename = "type")]
    pub direction: String,
    #[serde(rename = "paths", default)]
    pub files: Vec<HistoryFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryTransferState {
    #[serde(default)]
    pub created_at: u64,
    pub state: String,
    #[serde(default)]
    pub by_peer: bool,
    #[serde(default)]
    pub status_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryFile {
    #[serde(rename = "file_id")]
    pub id: String,
    #[serde(default)]
    pub transfer_id: String,
    #[serde(default)]
    pub base_path: String,
    pub relative_path: String,
    #[serde(rename = "bytes")]
    pub size: u64,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub states: Vec<HistoryFileState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryFileState {
    #[serde(default)]
    pub created_at: u64,
    pub state: String,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(rename = "base_dir", default)]
    pub base_dir: String,
    #[serde(default)]
    pub final_path: String,
    #[serde(default)]
    pub status_code: i32,
}

fn join(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    Path::new(base).join(relative).to_string_lossy().into_owned()
}

impl HistoryFile {
    fn status(&self) -> Status {
        let Some(last) = self.states.last() else {
            return Status::Requested;
        };
        match last.state.as_str() {
            "completed" => Status::Success,
            "failed" => Status::from_legacy_code(last.status_code),
            "paused" => Status::Paused,
            "pending" => Status::Requested,
            "reject" => Status::Canceled,
            "started" => Status::Ongoing,
            other => {
                warn!(file_id = %self.id, state = other, "Unknown file state in engine history");
                Status::BadStatus
            }
        }
    }

    /// Base directory of the file, reported on the file for uploads and on the first
    /// state for downloads
    fn base_dir(&self) -> &str {
        if !self.base_path.is_empty() {
            return &self.base_path;
        }
        self.states
            .first()
            .map(|s| s.base_dir.as_str())
            .unwrap_or_default()
    }

    pub fn to_file(&self) -> File {
        let mut full_path = join(&self.base_path, &self.relative_path);
        let mut transferred = 0;

        for state in &self.states {
            if !state.base_dir.is_empty() {
                full_path = join(&state.base_dir, &full_path);
            }
            if !state.final_path.is_empty() {
                full_path = state.final_path.clone();
            }
            if state.bytes_received != 0 {
                transferred = state.bytes_received;
            }
            if state.bytes_sent != 0 {
                transferred = state.bytes_sent;
            }
        }

        File {
            id: self.id.clone(),
            path: self.relative_path.clone(),
            full_path,
            size: self.size,
            transferred,
            status: self.status(),
        }
    }
}

/// Status of a transfer without an explicit terminal state, derived from its files
fn status_from_files(files: &[File]) -> Status {
    let started = files.iter().any(|f| f.status != Status::Requested);
    let current = if started {
        Status::Ongoing
    } else {
        Status::Requested
    };
    new_transfer_status(files.iter().map(|f| f.status), current)
}

impl HistoryTransfer {
    pub fn created(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.created_at)
            .single()
            .unwrap_or_default()
    }

    pub fn to_transfer(&self) -> Transfer {
        let direction = match self.direction.as_str() {
            "outgoing" => Direction::Outgoing,
            "incoming" => Direction::Incoming,
            other => {
                warn!(transfer_id = %self.id, direction = other, "Unknown transfer direction in engine history");
                Direction::UnknownDirection
            }
        };

        let mut path = String::new();
        let mut files = Vec::with_capacity(self.files.len());
        for history_file in &self.files {
            let file = history_file.to_file();

            // A bare file name means a single file was picked, show its full path
            let is_single_file = Path::new(&history_file.relative_path)
                .file_name()
                .map(|name| name == history_file.relative_path.as_str())
                .unwrap_or(false);
            let file_base = if direction == Direction::Outgoing && is_single_file {
                file.full_path.clone()
            } else {
                history_file.base_dir().to_string()
            };

            if path.is_empty() {
                path = file_base;
            } else if path != file_base && !file_base.is_empty() {
                path = MULTIPLE_FILES_PATH.to_string();
            }
            files.push(file);
        }

        let status = match self.states.last() {
            Some(last) if last.state == "canceled" && last.by_peer => Status::CanceledByPeer,
            Some(last) if last.state == "canceled" => Status::Canceled,
            Some(last) if last.state == "failed" => Status::from_legacy_code(last.status_code),
            _ => status_from_files(&files),
        };

        let mut transfer = Transfer {
            id: self.id.clone(),
            direction,
            peer: self.peer.clone(),
            status,
            created: self.created(),
            path,
            files,
            total_size: 0,
            total_transferred: 0,
        };
        transfer.recompute_totals();
        transfer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: &str = r#"[
        {
            "id": "b537743f-a2f2-4c44-8b5a-d5e3a4cd5e9e",
            "peer_id": "172.20.0.5",
            "created_at": 1700000000000,
            "states": [],
            "type": "incoming",
            "paths": [
                {
                    "file_id": "f1",
                    "transfer_id": "b537743f-a2f2-4c44-8b5a-d5e3a4cd5e9e",
                    "relative_path": "dir/a.txt",
                    "bytes": 100,
                    "states": [
                        {"state": "pending", "base_dir": "/home/user/Downloads"},
                        {"state": "started", "bytes_received": 0},
                        {"state": "completed", "final_path": "/home/user/Downloads/dir/a.txt"}
                    ]
                },
                {
                    "file_id": "f2",
                    "transfer_id": "b537743f-a2f2-4c44-8b5a-d5e3a4cd5e9e",
                    "relative_path": "dir/b.txt",
                    "bytes": 50,
                    "states": [{"state": "reject"}]
                }
            ]
        }
    ]"#;

    #[test]
    fn test_incoming_history_conversion() {
        let history: Vec<HistoryTransfer> = serde_json::from_str(HISTORY).unwrap();
        let transfer = history[0].to_transfer();

        assert_eq!(transfer.direction, Direction::Incoming);
        assert_eq!(transfer.status, Status::Success);
        assert_eq!(transfer.path, "/home/user/Downloads");
        assert_eq!(transfer.created.timestamp_millis(), 1700000000000);
        assert_eq!(transfer.files[0].full_path, "/home/user/Downloads/dir/a.txt");
        assert_eq!(transfer.files[1].status, Status::Canceled);
        assert_eq!(transfer.total_size, 100);
    }

    #[test]
    fn test_outgoing_multiple_files_path() {
        let transfer = HistoryTransfer {
            id: "t1".into(),
            peer: "172.20.0.5".into(),
            created_at: 0,
            states: vec![],
            direction: "outgoing".into(),
            files: vec![
                HistoryFile {
                    id: "a".into(),
                    transfer_id: "t1".into(),
                    base_path: "/tmp/one".into(),
                    relative_path: "a".into(),
                    size: 10,
                    created_at: 0,
                    states: vec![],
                },
                HistoryFile {
                    id: "b".into(),
                    transfer_id: "t1".into(),
                    base_path: "/tmp/two".into(),
                    relative_path: "b".into(),
                    size: 10,
                    created_at: 0,
                    states: vec![],
                },
            ],
        }
        .to_transfer();

        assert_eq!(transfer.path, MULTIPLE_FILES_PATH);
        assert_eq!(transfer.status, Status::Requested);
    }

    #[test]
    fn test_transfer_state_overrides_files() {
        let mut history: Vec<HistoryTransfer> = serde_json::from_str(HISTORY).unwrap();
        history[0].states.push(HistoryTransferState {
            created_at: 0,
            state: "canceled".into(),
            by_peer: true,
            status_code: 0,
        });
        assert_eq!(history[0].to_transfer().status, Status::CanceledByPeer);
    }

    #[test]
    fn test_unknown_file_state() {
        let file = HistoryFile {
            id: "a".into(),
            transfer_id: "t".into(),
            base_path: String::new(),
            relative_path: "a".into(),
            size: 1,
            created_at: 0,
            states: vec![HistoryFileState {
                created_at: 0,
                state: "exploded".into(),
                bytes_sent: 0,
                bytes_received: 0,
                base_dir: String::new(),
                final_path: String::new(),
                status_code: 0,
            }],
        };
        assert_eq!(file.to_file().status, Status::BadStatus);
    }
}
