mod bridge;
mod error;
mod history;
mod types;

pub use bridge::{CommandReceiver, EngineBridge, EngineCommand};
pub use error::{EngineError, EngineResult};
pub use history::{HistoryFile, HistoryFileState, HistoryTransfer, HistoryTransferState};
pub use types::{EngineEvent, EngineStatus, QueuedFile, ReceivedFile, StatusCode};

use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Commands issued to the transfer engine.
///
/// Engine failures are logged by the engine itself, callers only need to know that the
/// command did not go through.
pub trait Fileshare: Send + Sync {
    /// Start sending `paths` to `peer`, returns the engine-assigned transfer ID
    fn send(&self, peer: IpAddr, paths: &[String]) -> EngineResult<String>;

    /// Start downloading a single file of an incoming transfer into `dst_path`
    fn accept(&self, transfer_id: &str, dst_path: &str, file_id: &str) -> EngineResult<()>;

    /// Reject a single file, the engine reports it back as `FileRejected`
    fn reject_file(&self, transfer_id: &str, file_id: &str) -> EngineResult<()>;

    /// Close the transfer, the engine reports it back as `TransferFinalized`
    fn finalize(&self, transfer_id: &str) -> EngineResult<()>;
}

/// Transfer history persisted by the engine
pub trait EngineHistory: Send + Sync {
    fn transfers_since(&self, since: DateTime<Utc>) -> EngineResult<Vec<HistoryTransfer>>;

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> EngineResult<()>;
}
