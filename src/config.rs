use crate::mesh::Peer;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DIR_DEPTH_LIMIT: usize = 5;
pub const TRANSFER_FILE_LIMIT: usize = 1000;
pub const HISTORY_SIZE_MAX_BYTES: usize = 4 * 1024 * 1024;
pub const LIST_CHUNK_SIZE: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Daemon settings, every field may be omitted from the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileshareConfig {
    /// How deep directories are walked when counting files to send
    pub dir_depth_limit: usize,
    pub transfer_file_limit: usize,
    /// Size cap of the legacy history file
    pub history_size_max_bytes: usize,
    /// Transfers per `List` message
    pub list_chunk_size: usize,
    /// Directory holding the legacy `history` file
    pub storage_path: PathBuf,
    /// Engine history export, read by the native store
    pub engine_history_path: PathBuf,
    /// Destination for auto-accepted transfers and notification accepts
    pub default_download_dir: Option<PathBuf>,
    pub listen_addr: SocketAddr,
    pub mesh_enabled: bool,
    pub peers: Vec<Peer>,
    pub notifications: bool,
}

impl Default for FileshareConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        let storage_path = home.join(".config").join("meshshare");
        let downloads = home.join("Downloads");

        Self {
            dir_depth_limit: DIR_DEPTH_LIMIT,
            transfer_file_limit: TRANSFER_FILE_LIMIT,
            history_size_max_bytes: HISTORY_SIZE_MAX_BYTES,
            list_chunk_size: LIST_CHUNK_SIZE,
            engine_history_path: storage_path.join("engine_history.json"),
            storage_path,
            default_download_dir: downloads.is_dir().then_some(downloads),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            mesh_enabled: true,
            peers: Vec::new(),
            notifications: true,
        }
    }
}

impl FileshareConfig {
    /// Load from a JSON file, defaults are used when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
