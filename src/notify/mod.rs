mod desktop;
mod error;
pub mod manager;

pub use desktop::DesktopNotifier;
pub use error::{NotifyError, NotifyResult};
pub use manager::NotificationManager;

pub const ACTION_KEY_OPEN_FILE: &str = "open-file";
pub const ACTION_KEY_ACCEPT_TRANSFER: &str = "accept-transfer";
pub const ACTION_KEY_CANCEL_TRANSFER: &str = "cancel-transfer";

/// Button shown on a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub key: &'static str,
    pub label: &'static str,
}

/// What the user did with a notification, reported back by the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    OpenFile(u32),
    AcceptTransfer(u32),
    CancelTransfer(u32),
    Closed(u32),
}

impl NotificationAction {
    pub fn from_key(key: &str, notification_id: u32) -> Option<Self> {
        match key {
            ACTION_KEY_OPEN_FILE => Some(Self::OpenFile(notification_id)),
            ACTION_KEY_ACCEPT_TRANSFER => Some(Self::AcceptTransfer(notification_id)),
            ACTION_KEY_CANCEL_TRANSFER => Some(Self::CancelTransfer(notification_id)),
            "__closed" => Some(Self::Closed(notification_id)),
            _ => None,
        }
    }
}

/// Desktop notification delivery
pub trait Notifier: Send + Sync {
    /// Show a notification, returns its ID which is also the ID reported with its actions
    fn send_notification(&self, summary: &str, body: &str, actions: &[Action]) -> NotifyResult<u32>;

    fn close(&self) -> NotifyResult<()>;
}
