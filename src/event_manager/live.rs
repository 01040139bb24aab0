use crate::transfer::{get_new_transfer_status, File, Status, Transfer, TransferProgressInfo};
use std::collections::HashSet;

/// In-memory overlay of a transfer that has not been finalized yet.
///
/// Byte counters are kept here so progress ticks never touch the store.
#[derive(Debug, Clone)]
pub struct LiveTransfer {
    pub transfer: Transfer,
    finished: HashSet<String>,
    pub accepted: bool,
}

impl LiveTransfer {
    pub fn new(transfer: Transfer) -> Self {
        // Files the store already reports as terminal will not get more events
        let finished = transfer
            .files
            .iter()
            .filter(|f| f.status.is_terminal())
            .map(|f| f.id.clone())
            .collect();
        let accepted = !matches!(transfer.status, Status::Requested);

        Self {
            transfer,
            finished,
            accepted,
        }
    }

    /// Every file reached a terminal status. A transfer with no known files yet is
    /// never finished.
    pub fn is_finished(&self) -> bool {
        !self.transfer.files.is_empty()
            && self
                .transfer
                .files
                .iter()
                .all(|f| self.finished.contains(&f.id))
    }

    /// Adopt files the overlay does not know yet, known files keep their counters
    pub fn adopt_files(&mut self, files: impl IntoIterator<Item = File>) {
        for file in files {
            if self.transfer.find_file(&file.id).is_none() {
                self.transfer.files.push(file);
            }
        }
        self.transfer.recompute_totals();
    }

    /// Apply a progress report, returns false when the file is unknown or already finished
    pub fn update_progress(&mut self, file_id: &str, transferred: u64) -> bool {
        if self.finished.contains(file_id) {
            return false;
        }
        let total = self.transfer.total_transferred;
        let Some(file) = self.transfer.find_file_mut(file_id) else {
            return false;
        };

        let transferred = transferred.min(file.size);
        // Apply only the delta so the running total stays in step with the file counter
        let total = total
            .saturating_sub(file.transferred)
            .saturating_add(transferred);
        file.transferred = transferred;
        file.status = Status::Ongoing;

        self.transfer.total_transferred = total;
        self.transfer.status = Status::Ongoing;
        true
    }

    pub fn mark_started(&mut self, file_id: &str) -> bool {
        if self.finished.contains(file_id) {
            return false;
        }
        match self.transfer.find_file_mut(file_id) {
            Some(file) => {
                file.status = Status::Ongoing;
                true
            }
            None => false,
        }
    }

    /// Move a file to a terminal status and refresh the aggregate status.
    ///
    /// Files that were not delivered drop out of the totals. Returns the updated file,
    /// `None` when it is unknown or was already finished.
    pub fn finish_file(&mut self, file_id: &str, status: Status) -> Option<File> {
        if self.finished.contains(file_id) {
            return None;
        }
        let file = self.transfer.find_file_mut(file_id)?;
        file.status = status;
        if status == Status::Success {
            file.transferred = file.size;
        }
        let file = file.clone();

        self.finished.insert(file_id.to_string());
        self.transfer.recompute_totals();
        self.refresh_status();
        Some(file)
    }

    /// Force every unfinished file into `status`
    pub fn finish_remaining(&mut self, status: Status) {
        for file in &mut self.transfer.files {
            if !self.finished.contains(&file.id) {
                file.status = status;
                self.finished.insert(file.id.clone());
            }
        }
        self.transfer.recompute_totals();
    }

    pub fn refresh_status(&mut self) -> Status {
        self.transfer.status =
            get_new_transfer_status(&self.transfer.files, self.transfer.status);
        self.transfer.status
    }

    pub fn progress(&self) -> TransferProgressInfo {
        TransferProgressInfo {
            transfer_id: self.transfer.id.clone(),
            transferred: TransferProgressInfo::percent(
                self.transfer.total_transferred,
                self.transfer.total_size,
            ),
            status: self.transfer.status,
        }
    }
}
