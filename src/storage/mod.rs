pub mod combined;
pub mod error;
pub mod jsonfile;
pub mod native;

pub use combined::CombinedStorage;
pub use error::{StorageError, StorageResult};
pub use jsonfile::JsonFile;
pub use native::NativeStorage;

use crate::transfer::Transfer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Durable transfer history keyed by transfer ID
pub trait Storage: Send + Sync {
    fn load(&self) -> StorageResult<HashMap<String, Transfer>>;

    /// Drop every transfer created before `until`
    fn purge_transfers_until(&self, until: DateTime<Utc>) -> StorageResult<()>;
}
