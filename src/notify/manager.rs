use crate::notify::error::NotifyResult;
use crate::notify::{
    Action, Notifier, ACTION_KEY_ACCEPT_TRANSFER, ACTION_KEY_CANCEL_TRANSFER, ACTION_KEY_OPEN_FILE,
};
use crate::transfer::{file_status_summary, Direction, Status};
use dashmap::DashMap;
use std::io;
use tracing::{error, warn};

pub const NEW_TRANSFER_SUMMARY: &str = "New transfer request";
pub const AUTOACCEPTED_TRANSFER_SUMMARY: &str = "New transfer accepted";
pub const ACCEPT_FAILED_SUMMARY: &str = "Failed to accept transfer";
pub const ACCEPT_FILE_FAILED_SUMMARY: &str = "Failed to download file";
pub const CANCEL_FAILED_SUMMARY: &str = "Failed to cancel transfer";

pub const DOWNLOAD_DIR_NOT_FOUND: &str = "Default download directory not found";
pub const DOWNLOAD_DIR_IS_A_SYMLINK: &str = "Default download directory is a symlink";
pub const DOWNLOAD_DIR_IS_NOT_A_DIRECTORY: &str = "Default download directory is not a directory";
pub const DOWNLOAD_DIR_NO_PERMISSIONS: &str =
    "No permissions to write to the default download directory";
pub const NOT_ENOUGH_SPACE: &str = "Not enough space on the device";
pub const TRANSFER_ALREADY_ACCEPTED: &str = "Transfer has already been accepted";
pub const ACCEPT_ERROR_GENERIC: &str =
    "Failed to accept transfer, try command line, and if the issue repeats, contact customer support";
pub const TRANSFER_NOT_CANCELABLE: &str = "Transfer is already canceled or completed";
pub const CANCEL_ERROR_GENERIC: &str =
    "Failed to cancel transfer, try command line, and if the issue repeats, contact customer support";

const OPEN_ACTION: Action = Action {
    key: ACTION_KEY_OPEN_FILE,
    label: "Open",
};
const ACCEPT_ACTION: Action = Action {
    key: ACTION_KEY_ACCEPT_TRANSFER,
    label: "Accept",
};
const CANCEL_ACTION: Action = Action {
    key: ACTION_KEY_CANCEL_TRANSFER,
    label: "Cancel",
};

type FileOpener = Box<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

pub fn new_transfer_body(transfer_id: &str, peer: &str) -> String {
    format!("Transfer ID: {transfer_id}\nFrom: {peer}")
}

/// Raises desktop notifications for transfer events and remembers what each
/// notification's actions refer to
pub struct NotificationManager {
    notifier: Box<dyn Notifier>,
    /// Open action ID to downloaded file path
    downloaded_files: DashMap<u32, String>,
    /// Accept/Cancel action ID to incoming transfer ID
    transfers: DashMap<u32, String>,
    open_file: FileOpener,
}

impl NotificationManager {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self::with_opener(notifier, Box::new(|path| open::that(path)))
    }

    pub fn with_opener(notifier: Box<dyn Notifier>, open_file: FileOpener) -> Self {
        Self {
            notifier,
            downloaded_files: DashMap::new(),
            transfers: DashMap::new(),
            open_file,
        }
    }

    /// Notify about a single file reaching a final status.
    ///
    /// `file_path` should be the full on-disk path for downloads so the Open action
    /// has something to open.
    pub fn notify_file(&self, file_path: &str, direction: Direction, status: Status) {
        let summary = match file_status_summary(direction, status) {
            Some(summary) => summary,
            None => {
                error!(
                    ?direction,
                    ?status,
                    "No notification text for file status"
                );
                "-"
            }
        };

        if direction == Direction::Incoming && status == Status::Success {
            match self
                .notifier
                .send_notification(summary, file_path, &[OPEN_ACTION])
            {
                Ok(id) => {
                    self.downloaded_files.insert(id, file_path.to_string());
                }
                Err(e) => warn!(file = file_path, error = %e, "Failed to send file notification"),
            }
            return;
        }

        if let Err(e) = self.notifier.send_notification(summary, file_path, &[]) {
            warn!(file = file_path, error = %e, "Failed to send file notification");
        }
    }

    /// Ask the user to accept or cancel an incoming transfer
    pub fn notify_new_transfer(&self, transfer_id: &str, peer: &str) {
        let body = new_transfer_body(transfer_id, peer);
        match self.notifier.send_notification(
            NEW_TRANSFER_SUMMARY,
            &body,
            &[ACCEPT_ACTION, CANCEL_ACTION],
        ) {
            Ok(id) => {
                self.transfers.insert(id, transfer_id.to_string());
            }
            Err(e) => warn!(transfer_id, error = %e, "Failed to send new transfer notification"),
        }
    }

    pub fn notify_autoaccepted_transfer(&self, transfer_id: &str, peer: &str) {
        let body = new_transfer_body(transfer_id, peer);
        self.notify_generic(AUTOACCEPTED_TRANSFER_SUMMARY, &body);
    }

    /// The transfer arrived but could not be accepted automatically, `reason` leads the body
    pub fn notify_autoaccept_failed(&self, transfer_id: &str, peer: &str, reason: &str) {
        let body = format!("{reason}\n{}", new_transfer_body(transfer_id, peer));
        self.notify_generic(ACCEPT_FAILED_SUMMARY, &body);
    }

    pub fn notify_generic(&self, summary: &str, body: &str) {
        if let Err(e) = self.notifier.send_notification(summary, body, &[]) {
            warn!(summary, error = %e, "Failed to send notification");
        }
    }

    /// Open the file behind an Open action, each action works once
    pub fn open_file(&self, action_id: u32) {
        if let Some((_, path)) = self.downloaded_files.remove(&action_id) {
            if let Err(e) = (self.open_file)(&path) {
                warn!(file = %path, error = %e, "Failed to open file from notification");
            }
        }
    }

    /// Transfer referred to by an Accept/Cancel action, forgotten once taken
    pub fn take_transfer(&self, action_id: u32) -> Option<String> {
        self.transfers.remove(&action_id).map(|(_, id)| id)
    }

    pub fn close_notification(&self, action_id: u32) {
        self.downloaded_files.remove(&action_id);
        self.transfers.remove(&action_id);
    }

    pub fn disable(&self) -> NotifyResult<()> {
        self.downloaded_files.clear();
        self.transfers.clear();
        self.notifier.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        summary: String,
        body: String,
        actions: Vec<&'static str>,
    }

    #[derive(Default)]
    struct RecordingNotifier {
        next_id: AtomicU32,
        sent: Arc<Mutex<Vec<Sent>>>,
    }

    impl Notifier for RecordingNotifier {
        fn send_notification(
            &self,
            summary: &str,
            body: &str,
            actions: &[Action],
        ) -> NotifyResult<u32> {
            self.sent.lock().push(Sent {
                summary: summary.to_string(),
                body: body.to_string(),
                actions: actions.iter().map(|a| a.key).collect(),
            });
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn close(&self) -> NotifyResult<()> {
            Err(NotifyError::Closed)
        }
    }

    fn manager() -> (NotificationManager, Arc<Mutex<Vec<Sent>>>, Arc<Mutex<Vec<String>>>) {
        let notifier = RecordingNotifier::default();
        let sent = notifier.sent.clone();
        let opened = Arc::new(Mutex::new(Vec::new()));
        let opened_clone = opened.clone();
        let manager = NotificationManager::with_opener(
            Box::new(notifier),
            Box::new(move |path| {
                opened_clone.lock().push(path.to_string());
                Ok(())
            }),
        );
        (manager, sent, opened)
    }

    #[test]
    fn test_download_open_action_is_one_shot() {
        let (manager, sent, opened) = manager();

        manager.notify_file("/home/user/Downloads/a.txt", Direction::Incoming, Status::Success);
        {
            let sent = sent.lock();
            assert_eq!(sent[0].summary, "downloaded");
            assert_eq!(sent[0].actions, vec![ACTION_KEY_OPEN_FILE]);
        }

        manager.open_file(1);
        manager.open_file(1);
        assert_eq!(*opened.lock(), vec!["/home/user/Downloads/a.txt".to_string()]);
    }

    #[test]
    fn test_failed_file_has_no_actions() {
        let (manager, sent, _) = manager();

        manager.notify_file("a.txt", Direction::Outgoing, Status::FileChecksumMismatch);
        let sent = sent.lock();
        assert_eq!(sent[0].summary, "checksum mismatch");
        assert!(sent[0].actions.is_empty());
    }

    #[test]
    fn test_unknown_status_falls_back_to_dash() {
        let (manager, sent, _) = manager();

        manager.notify_file("a.txt", Direction::Outgoing, Status::Pending);
        assert_eq!(sent.lock()[0].summary, "-");
    }

    #[test]
    fn test_new_transfer_actions() {
        let (manager, sent, _) = manager();

        manager.notify_new_transfer("t1", "172.20.0.5");
        {
            let sent = sent.lock();
            assert_eq!(sent[0].body, "Transfer ID: t1\nFrom: 172.20.0.5");
            assert_eq!(
                sent[0].actions,
                vec![ACTION_KEY_ACCEPT_TRANSFER, ACTION_KEY_CANCEL_TRANSFER]
            );
        }

        assert_eq!(manager.take_transfer(1).as_deref(), Some("t1"));
        assert_eq!(manager.take_transfer(1), None);
    }

    #[test]
    fn test_close_forgets_actions() {
        let (manager, _, opened) = manager();

        manager.notify_file("/tmp/a", Direction::Incoming, Status::Success);
        manager.notify_new_transfer("t1", "peer");
        manager.close_notification(1);
        manager.close_notification(2);

        manager.open_file(1);
        assert!(opened.lock().is_empty());
        assert!(manager.take_transfer(2).is_none());
    }

    #[test]
    fn test_autoaccept_failed_body() {
        let (manager, sent, _) = manager();

        manager.notify_autoaccept_failed("t1", "peer", NOT_ENOUGH_SPACE);
        assert_eq!(
            sent.lock()[0].body,
            "Not enough space on the device\nTransfer ID: t1\nFrom: peer"
        );
    }
}
