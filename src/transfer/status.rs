use crate::transfer::types::{Direction, File, Status};

/// Compute a transfer status from the statuses of its files.
///
/// While at least one file is still in flight the current status is kept. Once every
/// file is terminal the result is `Canceled` when all of them were canceled, `Success`
/// when none failed and `FinishedWithErrors` otherwise.
pub fn new_transfer_status<I>(statuses: I, current: Status) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut any = false;
    let mut all_canceled = true;
    let mut all_finished = true;
    let mut has_errors = false;

    for status in statuses {
        any = true;
        if status != Status::Canceled {
            all_canceled = false;
        }
        if status.is_in_flight() {
            all_finished = false;
        }
        if status.is_failure() {
            has_errors = true;
        }
    }

    if !any {
        return current;
    }

    if all_canceled {
        Status::Canceled
    } else if all_finished && !has_errors {
        Status::Success
    } else if all_finished {
        Status::FinishedWithErrors
    } else {
        current
    }
}

pub fn get_new_transfer_status(files: &[File], current: Status) -> Status {
    new_transfer_status(files.iter().map(|f| f.status), current)
}

/// Human readable transfer status, `"-"` when the status has no text for the direction
pub fn transfer_status_text(direction: Direction, status: Status) -> &'static str {
    match (direction, status) {
        (Direction::Incoming, Status::Requested) => "waiting for download",
        (Direction::Incoming, Status::Ongoing) => "downloading",
        (Direction::Outgoing, Status::Requested) => "request sent",
        (Direction::Outgoing, Status::Ongoing) => "uploading",
        (Direction::UnknownDirection, _) => "-",
        (_, Status::Success) => "completed",
        (_, Status::Interrupted) => "interrupted",
        (_, Status::FinishedWithErrors) => "completed with errors",
        (_, Status::AcceptFailure) => "accepted with errors",
        (_, Status::Canceled) => "canceled",
        (_, Status::CanceledByPeer) => "canceled by peer",
        _ => "-",
    }
}

fn directional_file_status(direction: Direction, status: Status) -> Option<&'static str> {
    match direction {
        Direction::Incoming => match status {
            Status::Success => Some("downloaded"),
            Status::Canceled => Some("canceled"),
            Status::Requested => Some("waiting for download"),
            Status::Ongoing => Some("downloading"),
            Status::FinishedWithErrors => Some("downloaded with errors"),
            Status::AcceptFailure => Some("accepted with errors"),
            _ => None,
        },
        Direction::Outgoing => match status {
            Status::Success => Some("uploaded"),
            Status::Canceled => Some("canceled"),
            Status::Requested => Some("request sent"),
            Status::Ongoing => Some("uploading"),
            Status::FinishedWithErrors => Some("uploaded with errors"),
            Status::AcceptFailure => Some("accepted with errors"),
            _ => None,
        },
        Direction::UnknownDirection => None,
    }
}

fn generic_file_status(status: Status) -> Option<&'static str> {
    let text = match status {
        Status::Success => "completed",
        Status::Canceled | Status::FileRejected => "canceled",
        Status::Interrupted => "interrupted",
        Status::BadPath => "bad path",
        Status::BadFile => "bad file",
        Status::BadStatus => "bad status",
        Status::ServiceStop => "service not active",
        Status::BadTransfer => "bad transfer",
        Status::BadTransferState => "bad transfer state",
        Status::BadFileId => "bad file id",
        Status::Io => "io error",
        Status::DirectoryNotExpected => "directory not expected",
        Status::EmptyTransfer => "empty transfer",
        Status::TransferClosedByPeer => "transfer closed by peer",
        Status::TransferLimitsExceeded => "limits exceeded",
        Status::MismatchedSize | Status::UnexpectedData | Status::FileModified => {
            "file was changed"
        }
        Status::InvalidArgument | Status::StorageError | Status::DbLost => "internal error",
        Status::TransferTimeout => "transfer timeout",
        Status::AddrInUse => "address already in use",
        Status::FilenameTooLong => "filename too long",
        Status::AuthenticationFailed => "authentication failed",
        Status::FileChecksumMismatch => "checksum mismatch",
        Status::FileFailed => "file failed",
        Status::FileFinished => "file already transferred",
        Status::TooManyRequests => "too many requests",
        Status::PermissionDenied => "permission denied",
        _ => return None,
    };
    Some(text)
}

/// Summary for a per-file notification.
///
/// Direction specific text wins over the generic table. `None` means the status has no
/// presentation at all.
pub fn file_status_summary(direction: Direction, status: Status) -> Option<&'static str> {
    directional_file_status(direction, status).or_else(|| generic_file_status(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(statuses: &[Status]) -> Vec<File> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut file = File::new(format!("file{i}"), 10);
                file.status = *status;
                file
            })
            .collect()
    }

    #[test]
    fn test_all_canceled() {
        let files = files(&[Status::Canceled, Status::Canceled]);
        assert_eq!(
            get_new_transfer_status(&files, Status::Ongoing),
            Status::Canceled
        );
    }

    #[test]
    fn test_success_with_rejected_files() {
        let files = files(&[Status::Success, Status::Canceled, Status::Success]);
        assert_eq!(
            get_new_transfer_status(&files, Status::Ongoing),
            Status::Success
        );
    }

    #[test]
    fn test_finished_with_errors() {
        let files = files(&[Status::Success, Status::BadFile, Status::Canceled]);
        assert_eq!(
            get_new_transfer_status(&files, Status::Ongoing),
            Status::FinishedWithErrors
        );
    }

    #[test]
    fn test_in_flight_keeps_current() {
        let files = files(&[Status::Success, Status::Ongoing]);
        assert_eq!(
            get_new_transfer_status(&files, Status::Ongoing),
            Status::Ongoing
        );
        let files = self::files(&[Status::Requested, Status::BadFile]);
        assert_eq!(
            get_new_transfer_status(&files, Status::Requested),
            Status::Requested
        );
    }

    #[test]
    fn test_empty_file_set_keeps_current() {
        assert_eq!(
            get_new_transfer_status(&[], Status::Requested),
            Status::Requested
        );
    }

    #[test]
    fn test_terminal_status_is_stable() {
        let sets: [&[Status]; 4] = [
            &[Status::Success, Status::Success],
            &[Status::Canceled, Status::Canceled],
            &[Status::Success, Status::FileChecksumMismatch],
            &[Status::Canceled, Status::Io, Status::Success],
        ];
        let currents = [
            Status::Requested,
            Status::Ongoing,
            Status::Success,
            Status::FinishedWithErrors,
        ];

        for set in sets {
            let files = files(set);
            let first = get_new_transfer_status(&files, Status::Ongoing);
            for current in currents {
                assert_eq!(get_new_transfer_status(&files, current), first);
                assert_eq!(get_new_transfer_status(&files, first), first);
            }
        }
    }

    #[test]
    fn test_file_summary_tiers() {
        assert_eq!(
            file_status_summary(Direction::Incoming, Status::Success),
            Some("downloaded")
        );
        assert_eq!(
            file_status_summary(Direction::Outgoing, Status::Success),
            Some("uploaded")
        );
        assert_eq!(
            file_status_summary(Direction::Incoming, Status::BadFile),
            Some("bad file")
        );
        assert_eq!(
            file_status_summary(Direction::Outgoing, Status::CanceledByPeer),
            None
        );
    }

    #[test]
    fn test_transfer_status_text() {
        assert_eq!(
            transfer_status_text(Direction::Incoming, Status::Ongoing),
            "downloading"
        );
        assert_eq!(
            transfer_status_text(Direction::Outgoing, Status::CanceledByPeer),
            "canceled by peer"
        );
        assert_eq!(
            transfer_status_text(Direction::Outgoing, Status::BadFile),
            "-"
        );
    }
}
