//! In-memory doubles of the engine, the store and the host used by unit tests

use crate::engine::{EngineError, EngineResult, Fileshare};
use crate::notify::{Action, Notifier, NotifyResult};
use crate::storage::{Storage, StorageResult};
use crate::system::{DirEntry, FileInfo, Filesystem, OsInfo};
use crate::transfer::Transfer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Send(IpAddr, Vec<String>),
    Accept(String, String, String),
    RejectFile(String, String),
    Finalize(String),
}

#[derive(Default)]
pub struct FakeFileshare {
    pub calls: Mutex<Vec<EngineCall>>,
    pub fail_accept: Mutex<bool>,
    pub fail_finalize: Mutex<bool>,
    pub fail_send: Mutex<bool>,
    next_id: AtomicU32,
}

impl FakeFileshare {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }
}

impl Fileshare for FakeFileshare {
    fn send(&self, peer: IpAddr, paths: &[String]) -> EngineResult<String> {
        self.calls.lock().push(EngineCall::Send(peer, paths.to_vec()));
        if *self.fail_send.lock() {
            return Err(EngineError::Library("send refused".into()));
        }
        Ok(format!("transfer-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn accept(&self, transfer_id: &str, dst_path: &str, file_id: &str) -> EngineResult<()> {
        self.calls.lock().push(EngineCall::Accept(
            transfer_id.into(),
            dst_path.into(),
            file_id.into(),
        ));
        if *self.fail_accept.lock() {
            return Err(EngineError::Library("accept refused".into()));
        }
        Ok(())
    }

    fn reject_file(&self, transfer_id: &str, file_id: &str) -> EngineResult<()> {
        self.calls
            .lock()
            .push(EngineCall::RejectFile(transfer_id.into(), file_id.into()));
        Ok(())
    }

    fn finalize(&self, transfer_id: &str) -> EngineResult<()> {
        self.calls
            .lock()
            .push(EngineCall::Finalize(transfer_id.into()));
        if *self.fail_finalize.lock() {
            return Err(EngineError::Library("finalize refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    pub transfers: Mutex<HashMap<String, Transfer>>,
}

impl MemoryStorage {
    pub fn with(transfers: Vec<Transfer>) -> Self {
        Self {
            transfers: Mutex::new(transfers.into_iter().map(|t| (t.id.clone(), t)).collect()),
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> StorageResult<HashMap<String, Transfer>> {
        Ok(self.transfers.lock().clone())
    }

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> StorageResult<()> {
        self.transfers.lock().retain(|_, t| t.created >= until);
        Ok(())
    }
}

pub const UID: u32 = 1000;

/// Filesystem of paths registered up front, everything else does not exist
pub struct FakeFilesystem {
    pub entries: Mutex<HashMap<PathBuf, FileInfo>>,
    pub children: Mutex<HashMap<PathBuf, Vec<DirEntry>>>,
    pub available: Mutex<u64>,
}

impl Default for FakeFilesystem {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            children: Mutex::new(HashMap::new()),
            available: Mutex::new(u64::MAX),
        }
    }
}

impl FakeFilesystem {
    pub fn dir(path: &str) -> Self {
        let fs = Self::default();
        fs.add_dir(path);
        fs
    }

    pub fn add_dir(&self, path: &str) {
        self.entries.lock().insert(
            PathBuf::from(path),
            FileInfo {
                is_dir: true,
                is_symlink: false,
                uid: UID,
                gid: UID,
                mode: 0o755,
            },
        );
    }

    pub fn add(&self, path: &str, info: FileInfo) {
        self.entries.lock().insert(PathBuf::from(path), info);
    }

    pub fn add_file(&self, path: &str) {
        self.add(
            path,
            FileInfo {
                is_dir: false,
                is_symlink: false,
                uid: UID,
                gid: UID,
                mode: 0o644,
            },
        );
    }

    pub fn set_children(&self, path: &str, children: Vec<DirEntry>) {
        self.children.lock().insert(PathBuf::from(path), children);
    }
}

fn not_found() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "no such file or directory")
}

impl Filesystem for FakeFilesystem {
    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        self.entries.lock().get(path).copied().ok_or_else(not_found)
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let info = self.lstat(path)?;
        Ok(FileInfo {
            is_symlink: false,
            ..info
        })
    }

    fn available_space(&self, _path: &Path) -> io::Result<u64> {
        Ok(*self.available.lock())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.children.lock().get(path).cloned().ok_or_else(not_found)
    }
}

pub struct FakeOsInfo;

impl OsInfo for FakeOsInfo {
    fn current_uid(&self) -> u32 {
        UID
    }

    fn group_ids(&self) -> io::Result<Vec<u32>> {
        Ok(vec![UID])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub id: u32,
    pub summary: String,
    pub body: String,
    pub actions: Vec<&'static str>,
}

#[derive(Default, Clone)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<SentNotification>>>,
    next_id: Arc<AtomicU32>,
}

impl RecordingNotifier {
    pub fn summaries(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.summary.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_notification(&self, summary: &str, body: &str, actions: &[Action]) -> NotifyResult<u32> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().push(SentNotification {
            id,
            summary: summary.to_string(),
            body: body.to_string(),
            actions: actions.iter().map(|a| a.key).collect(),
        });
        Ok(id)
    }

    fn close(&self) -> NotifyResult<()> {
        Ok(())
    }
}
