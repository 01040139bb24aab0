use crate::storage::error::{StorageError, StorageResult};
use crate::storage::Storage;
use crate::transfer::Transfer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Engine history overlaid with the legacy history file.
///
/// The native store is authoritative, legacy entries only fill in IDs it does not know.
/// A missing or unreadable legacy file never fails the load.
pub struct CombinedStorage<N, L> {
    native: N,
    legacy: L,
}

impl<N: Storage, L: Storage> CombinedStorage<N, L> {
    pub fn new(native: N, legacy: L) -> Self {
        Self { native, legacy }
    }
}

impl<N: Storage, L: Storage> Storage for CombinedStorage<N, L> {
    fn load(&self) -> StorageResult<HashMap<String, Transfer>> {
        let mut transfers = self.native.load()?;

        match self.legacy.load() {
            Ok(legacy) => {
                for (id, transfer) in legacy {
                    transfers.entry(id).or_insert(transfer);
                }
            }
            Err(StorageError::NotFound(path)) => {
                debug!(path = %path, "No legacy transfer history");
            }
            Err(e) => {
                warn!(error = %e, "Failed to load legacy transfer history");
            }
        }

        Ok(transfers)
    }

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> StorageResult<()> {
        if let Err(e) = self.legacy.purge_transfers_until(until) {
            warn!(error = %e, "Failed to purge legacy transfer history");
        }
        self.native.purge_transfers_until(until)
    }
}
