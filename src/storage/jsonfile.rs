use crate::storage::error::{StorageError, StorageResult};
use crate::storage::Storage;
use crate::transfer::{Direction, File, Status, Transfer};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const HISTORY_FILE: &str = "history";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyTimestamp {
    #[serde(default)]
    seconds: i64,
    #[serde(default)]
    nanos: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyFile {
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    path: String,
    #[serde(rename = "fullPath", default, skip_serializing_if = "String::is_empty")]
    full_path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    transferred: u64,
    #[serde(default)]
    status: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, LegacyFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyTransfer {
    #[serde(default)]
    id: String,
    #[serde(default)]
    direction: i32,
    #[serde(default)]
    peer: String,
    #[serde(default)]
    status: i32,
    #[serde(default)]
    created: Option<LegacyTimestamp>,
    #[serde(default)]
    files: Vec<LegacyFile>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    path: String,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    total_transferred: u64,
}

fn direction_from_code(code: i32) -> Direction {
    match code {
        1 => Direction::Incoming,
        2 => Direction::Outgoing,
        _ => Direction::UnknownDirection,
    }
}

fn direction_code(direction: Direction) -> i32 {
    match direction {
        Direction::UnknownDirection => 0,
        Direction::Incoming => 1,
        Direction::Outgoing => 2,
    }
}

/// Flatten a legacy file tree into leaf files, IDs become `parent/child` chains
fn flatten_into(file: &LegacyFile, id: String, out: &mut Vec<File>) {
    if file.children.is_empty() {
        let path = if file.path.is_empty() {
            id.clone()
        } else {
            file.path.clone()
        };
        out.push(File {
            id,
            path,
            full_path: file.full_path.clone(),
            size: file.size,
            transferred: file.transferred,
            status: Status::from_legacy_code(file.status),
        });
        return;
    }

    for (key, child) in &file.children {
        flatten_into(child, format!("{id}/{key}"), out);
    }
}

impl LegacyTransfer {
    fn into_transfer(self) -> Transfer {
        let mut files = Vec::new();
        for file in &self.files {
            flatten_into(file, file.id.clone(), &mut files);
        }

        let created = self
            .created
            .and_then(|ts| Utc.timestamp_opt(ts.seconds, ts.nanos).single())
            .unwrap_or_default();

        Transfer {
            id: self.id,
            direction: direction_from_code(self.direction),
            peer: self.peer,
            status: Status::from_legacy_code(self.status),
            created,
            path: self.path,
            files,
            total_size: self.total_size,
            total_transferred: self.total_transferred,
        }
    }

    fn from_transfer(transfer: &Transfer) -> Self {
        Self {
            id: transfer.id.clone(),
            direction: direction_code(transfer.direction),
            peer: transfer.peer.clone(),
            status: transfer.status.legacy_code(),
            created: Some(LegacyTimestamp {
                seconds: transfer.created.timestamp(),
                nanos: transfer.created.timestamp_subsec_nanos(),
            }),
            files: transfer
                .files
                .iter()
                .map(|f| LegacyFile {
                    id: f.id.clone(),
                    path: f.path.clone(),
                    full_path: f.full_path.clone(),
                    size: f.size,
                    transferred: f.transferred,
                    status: f.status.legacy_code(),
                    children: BTreeMap::new(),
                })
                .collect(),
            path: transfer.path.clone(),
            total_size: transfer.total_size,
            total_transferred: transfer.total_transferred,
        }
    }
}

/// History written by older releases as a single JSON document
pub struct JsonFile {
    path: PathBuf,
    max_size_bytes: usize,
}

impl JsonFile {
    pub fn new(storage_dir: impl AsRef<Path>, max_size_bytes: usize) -> Self {
        Self {
            path: storage_dir.as_ref().join(HISTORY_FILE),
            max_size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StorageResult<HashMap<String, Transfer>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let legacy: HashMap<String, LegacyTransfer> = serde_json::from_slice(&bytes)?;
        Ok(legacy
            .into_iter()
            .map(|(id, transfer)| (id, transfer.into_transfer()))
            .collect())
    }

    /// Write history, evicting the oldest transfers that are not ongoing until the
    /// encoded document fits
    pub fn save(&self, transfers: &HashMap<String, Transfer>) -> StorageResult<()> {
        let mut legacy: HashMap<String, LegacyTransfer> = transfers
            .iter()
            .map(|(id, t)| (id.clone(), LegacyTransfer::from_transfer(t)))
            .collect();
        let mut created: HashMap<String, (DateTime<Utc>, Status)> = transfers
            .iter()
            .map(|(id, t)| (id.clone(), (t.created, t.status)))
            .collect();

        let encoded = loop {
            let encoded = serde_json::to_vec(&legacy)?;
            if encoded.len() < self.max_size_bytes {
                break encoded;
            }

            info!(
                size = encoded.len(),
                limit = self.max_size_bytes,
                "Truncating transfer history"
            );
            let oldest = created
                .iter()
                .filter(|(_, (_, status))| *status != Status::Ongoing)
                .min_by_key(|(_, (created, _))| *created)
                .map(|(id, _)| id.clone());

            match oldest {
                Some(id) => {
                    legacy.remove(&id);
                    created.remove(&id);
                }
                None => {
                    warn!("Cannot truncate transfer history, every transfer is ongoing");
                    break encoded;
                }
            }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}

impl Storage for JsonFile {
    /// Transfers left in flight by an unclean shutdown come back as interrupted
    fn load(&self) -> StorageResult<HashMap<String, Transfer>> {
        let mut transfers = self.read()?;
        for transfer in transfers.values_mut() {
            if transfer.status.is_active() {
                transfer.status = Status::Interrupted;
                for file in &mut transfer.files {
                    file.status = Status::Interrupted;
                }
            }
        }
        Ok(transfers)
    }

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> StorageResult<()> {
        let mut transfers = match self.read() {
            Ok(transfers) => transfers,
            Err(StorageError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        transfers.retain(|_, t| t.created >= until);
        self.save(&transfers)
    }
}
