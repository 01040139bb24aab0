use crate::engine::EngineHistory;
use crate::storage::error::StorageResult;
use crate::storage::Storage;
use crate::transfer::Transfer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// History kept by the transfer engine itself
pub struct NativeStorage {
    engine: Arc<dyn EngineHistory>,
}

impl NativeStorage {
    pub fn new(engine: Arc<dyn EngineHistory>) -> Self {
        Self { engine }
    }
}

impl Storage for NativeStorage {
    fn load(&self) -> StorageResult<HashMap<String, Transfer>> {
        let history = self.engine.transfers_since(DateTime::<Utc>::default())?;
        Ok(history
            .iter()
            .map(|record| {
                let transfer = record.to_transfer();
                (transfer.id.clone(), transfer)
            })
            .collect())
    }

    fn purge_transfers_until(&self, until: DateTime<Utc>) -> StorageResult<()> {
        self.engine.purge_transfers_until(until)?;
        Ok(())
    }
}
