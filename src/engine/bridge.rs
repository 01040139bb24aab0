use crate::engine::error::{EngineError, EngineResult};
use crate::engine::history::HistoryTransfer;
use crate::engine::{EngineHistory, Fileshare};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Command frame sent to an out-of-process engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum EngineCommand {
    Send {
        transfer: String,
        peer: IpAddr,
        paths: Vec<String>,
    },
    Accept {
        transfer: String,
        dst_path: String,
        file: String,
    },
    RejectFile {
        transfer: String,
        file: String,
    },
    Finalize {
        transfer: String,
    },
    PurgeTransfersUntil {
        /// Milliseconds since the unix epoch
        until: i64,
    },
}

pub type CommandReceiver = mpsc::UnboundedReceiver<EngineCommand>;

/// Engine running in another process.
///
/// Commands are queued on a channel drained by the engine connection, events come back
/// through `EventManager::on_event_json`. History is read from the export the engine
/// keeps next to the daemon's own storage.
pub struct EngineBridge {
    commands: mpsc::UnboundedSender<EngineCommand>,
    history_path: PathBuf,
}

impl EngineBridge {
    pub fn new(history_path: impl AsRef<Path>) -> (Self, CommandReceiver) {
        let (commands, rx) = mpsc::unbounded_channel();
        (
            Self {
                commands,
                history_path: history_path.as_ref().to_path_buf(),
            },
            rx,
        )
    }

    fn submit(&self, command: EngineCommand) -> EngineResult<()> {
        debug!(?command, "Queueing engine command");
        self.commands
            .send(command)
            .map_err(|_| EngineError::Library("engine connection closed".into()))
    }
}

impl Fileshare for EngineBridge {
    fn send(&self, peer: IpAddr, paths: &[String]) -> EngineResult<String> {
        let transfer = Uuid::new_v4().to_string();
        self.submit(EngineCommand::Send {
            transfer: transfer.clone(),
            peer,
            paths: paths.to_vec(),
        })?;
        Ok(transfer)
    }

    fn accept(&self, transfer_id: &str, dst_path: &str, file_id: &str) -> EngineResult<()> {
        self.submit(EngineCommand::Accept {
            transfer: transfer_id.to_string(),
            dst_path: dst_path.to_string(),
            file: file_id.to_string(),
        })
    }

    fn reject_file(&self, transfer_id: &str, file_id: &str) -> EngineResult<()> {
        self.submit(EngineCommand::RejectFile {
            transfer: transfer_id.to_string(),
            file: file_id.to_string(),
        })
    }

    fn finalize(&self, transfer_id: &str) -> EngineResult<()> {
        self.submit(EngineCommand::Finalize {
            transfer: transfer_id.to_string(),
        })
    }
}

impl EngineHistory for EngineBridge {
    fn transfers_since(&self, since: DateTime<Utc>) -> EngineResult<Vec<HistoryTransfer>> {
        let data = match std::fs::read(&self.history_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(EngineError::Library(e.to_string())),
        };

        let since = since.timestamp_millis();
        let transfers: Vec<HistoryTransfer> = serde_json::from_slice(&data)?;
        Ok(transfers
            .into_iter()
            .filter(|t| t.created_at >= since)
            .collect())
    }

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> EngineResult<()> {
        self.submit(EngineCommand::PurgeTransfersUntil {
            until: until.timestamp_millis(),
        })
    }
}
