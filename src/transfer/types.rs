use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path shown for outgoing transfers built from more than one root path
pub const MULTIPLE_FILES_PATH: &str = "multiple files";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    UnknownDirection,
    Incoming,
    Outgoing,
}

/// Status shared by transfers and files.
///
/// Transfers only ever carry the aggregate statuses (`Requested`, `Ongoing`, `Success`,
/// `FinishedWithErrors`, `Canceled`, `CanceledByPeer`, `AcceptFailure`, `Interrupted`)
/// or a failure reported by the engine for the whole transfer. Files may carry any of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Canceled,
    BadPath,
    BadFile,
    ServiceStop,
    BadTransfer,
    BadTransferState,
    BadFileId,
    Io,
    DirectoryNotExpected,
    EmptyTransfer,
    TransferClosedByPeer,
    TransferLimitsExceeded,
    MismatchedSize,
    UnexpectedData,
    InvalidArgument,
    TransferTimeout,
    AddrInUse,
    FileModified,
    FilenameTooLong,
    AuthenticationFailed,
    StorageError,
    DbLost,
    FileChecksumMismatch,
    FileRejected,
    FileFailed,
    FileFinished,
    TooManyRequests,
    PermissionDenied,
    BadStatus,
    Requested,
    Ongoing,
    FinishedWithErrors,
    AcceptFailure,
    CanceledByPeer,
    Interrupted,
    Paused,
    Pending,
}

impl Status {
    /// More engine events are still expected for a file in this status
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Status::Requested | Status::Ongoing | Status::Paused | Status::Pending
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_in_flight()
    }

    /// Terminal, but neither delivered nor deliberately canceled
    pub fn is_failure(self) -> bool {
        !self.is_in_flight() && !matches!(self, Status::Success | Status::Canceled)
    }

    /// Transfer can still be canceled by the user
    pub fn is_active(self) -> bool {
        matches!(self, Status::Requested | Status::Ongoing)
    }

    /// Numeric code used by the legacy history file
    pub fn legacy_code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Canceled => 1,
            Status::BadPath => 2,
            Status::BadFile => 3,
            Status::BadStatus => 5,
            Status::ServiceStop => 6,
            Status::BadTransfer => 7,
            Status::BadTransferState => 8,
            Status::BadFileId => 9,
            Status::Io => 15,
            Status::DirectoryNotExpected => 17,
            Status::EmptyTransfer => 18,
            Status::TransferClosedByPeer => 19,
            Status::TransferLimitsExceeded => 20,
            Status::MismatchedSize => 21,
            Status::UnexpectedData => 22,
            Status::InvalidArgument => 23,
            Status::TransferTimeout => 24,
            Status::FileModified => 28,
            Status::FilenameTooLong => 29,
            Status::AuthenticationFailed => 30,
            Status::FileChecksumMismatch => 33,
            Status::FileRejected => 34,
            Status::Requested => 100,
            Status::Ongoing => 101,
            Status::FinishedWithErrors => 102,
            Status::AcceptFailure => 103,
            Status::CanceledByPeer => 104,
            Status::Interrupted => 105,
            Status::Paused => 106,
            Status::Pending => 107,
            Status::AddrInUse
            | Status::StorageError
            | Status::DbLost
            | Status::FileFailed
            | Status::FileFinished
            | Status::TooManyRequests
            | Status::PermissionDenied => 5,
        }
    }

    pub fn from_legacy_code(code: i32) -> Self {
        match code {
            0 => Status::Success,
            1 => Status::Canceled,
            2 => Status::BadPath,
            3 => Status::BadFile,
            6 => Status::ServiceStop,
            7 => Status::BadTransfer,
            8 => Status::BadTransferState,
            9 => Status::BadFileId,
            15 => Status::Io,
            17 => Status::DirectoryNotExpected,
            18 => Status::EmptyTransfer,
            19 => Status::TransferClosedByPeer,
            20 => Status::TransferLimitsExceeded,
            21 => Status::MismatchedSize,
            22 => Status::UnexpectedData,
            23 => Status::InvalidArgument,
            24 => Status::TransferTimeout,
            28 => Status::FileModified,
            29 => Status::FilenameTooLong,
            30 => Status::AuthenticationFailed,
            33 => Status::FileChecksumMismatch,
            34 => Status::FileRejected,
            100 => Status::Requested,
            101 => Status::Ongoing,
            102 => Status::FinishedWithErrors,
            103 => Status::AcceptFailure,
            104 => Status::CanceledByPeer,
            105 => Status::Interrupted,
            106 => Status::Paused,
            107 => Status::Pending,
            _ => Status::BadStatus,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    /// Relative path within the transfer, used for every lookup
    pub id: String,
    pub path: String,
    pub full_path: String,
    pub size: u64,
    pub transferred: u64,
    pub status: Status,
}

impl File {
    pub fn new(id: impl Into<String>, size: u64) -> Self {
        let id = id.into();
        Self {
            path: id.clone(),
            id,
            full_path: String::new(),
            size,
            transferred: 0,
            status: Status::Requested,
        }
    }

    /// Only files that were or still may be delivered count towards transfer totals
    pub fn counts_towards_totals(&self) -> bool {
        self.status != Status::Canceled && !self.status.is_failure()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub id: String,
    pub direction: Direction,
    pub peer: String,
    pub status: Status,
    pub created: DateTime<Utc>,
    /// Outgoing: path being sent. Incoming: accept destination, empty until accepted.
    pub path: String,
    pub files: Vec<File>,
    pub total_size: u64,
    pub total_transferred: u64,
}

impl Transfer {
    pub fn new_incoming(id: impl Into<String>, peer: impl Into<String>, files: Vec<File>) -> Self {
        let mut transfer = Self {
            id: id.into(),
            direction: Direction::Incoming,
            peer: peer.into(),
            status: Status::Requested,
            created: Utc::now(),
            path: String::new(),
            files,
            total_size: 0,
            total_transferred: 0,
        };
        for file in &mut transfer.files {
            file.status = Status::Requested;
        }
        transfer.recompute_totals();
        transfer
    }

    pub fn new_outgoing(
        id: impl Into<String>,
        peer: impl Into<String>,
        path: impl Into<String>,
        files: Vec<File>,
    ) -> Self {
        let mut transfer = Self {
            id: id.into(),
            direction: Direction::Outgoing,
            peer: peer.into(),
            status: Status::Requested,
            created: Utc::now(),
            path: path.into(),
            files,
            total_size: 0,
            total_transferred: 0,
        };
        transfer.recompute_totals();
        transfer
    }

    pub fn find_file(&self, file_id: &str) -> Option<&File> {
        self.files.iter().find(|f| f.id == file_id)
    }

    pub fn find_file_mut(&mut self, file_id: &str) -> Option<&mut File> {
        self.files.iter_mut().find(|f| f.id == file_id)
    }

    /// Look a file up by ID first, then by its display path
    pub fn find_file_by_id_or_path(&self, key: &str) -> Option<&File> {
        self.find_file(key)
            .or_else(|| self.files.iter().find(|f| f.path == key))
    }

    /// Files picked by an accept request, all of them when `requested` is empty
    pub fn selected_files<'a>(&'a self, requested: &'a [String]) -> impl Iterator<Item = &'a File> {
        self.files
            .iter()
            .filter(move |file| is_file_selected(file, requested))
    }

    /// Sum sizes and transferred bytes of files that are still expected to be delivered
    pub fn recompute_totals(&mut self) {
        let (size, transferred) = self
            .files
            .iter()
            .filter(|f| f.counts_towards_totals())
            .fold((0u64, 0u64), |(size, transferred), f| {
                (size + f.size, transferred + f.transferred)
            });
        self.total_size = size;
        self.total_transferred = transferred;
    }
}

/// A file is selected when no filter was given or when its ID or path starts with one
/// of the requested strings. Matching is a plain string prefix, so `nested/ab` also
/// selects `nested/abc.txt`.
pub fn is_file_selected(file: &File, requested: &[String]) -> bool {
    if requested.is_empty() {
        return true;
    }

    requested
        .iter()
        .any(|prefix| file.id.starts_with(prefix.as_str()) || file.path.starts_with(prefix.as_str()))
}

/// Progress update delivered to a transfer subscriber
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferProgressInfo {
    pub transfer_id: String,
    /// Percentage of transferred bytes, 0-100
    pub transferred: u32,
    pub status: Status,
}

impl TransferProgressInfo {
    pub fn percent(transferred: u64, total: u64) -> u32 {
        if total == 0 {
            return 0;
        }
        let percent = (transferred as u128 * 100) / total as u128;
        percent.min(100) as u32
    }
}
