use crate::notify::error::{NotifyError, NotifyResult};
use crate::notify::{Action, NotificationAction, Notifier};
use notify_rust::{Notification, Timeout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

const APP_NAME: &str = "meshshare";

/// Notifier talking to the desktop notification server over D-Bus.
///
/// Notifications with actions get a short-lived thread waiting for the user, the
/// outcome is forwarded on the action channel.
pub struct DesktopNotifier {
    actions: UnboundedSender<NotificationAction>,
    closed: Arc<AtomicBool>,
}

impl DesktopNotifier {
    pub fn new(actions: UnboundedSender<NotificationAction>) -> Self {
        Self {
            actions,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn send_notification(&self, summary: &str, body: &str, actions: &[Action]) -> NotifyResult<u32> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NotifyError::Closed);
        }

        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(summary)
            .body(body)
            .auto_icon()
            .timeout(Timeout::Default);
        for action in actions {
            notification.action(action.key, action.label);
        }

        let handle = notification
            .show()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        let id = handle.id();

        if !actions.is_empty() {
            let sender = self.actions.clone();
            let closed = self.closed.clone();
            std::thread::spawn(move || {
                handle.wait_for_action(|key| {
                    if closed.load(Ordering::Acquire) {
                        return;
                    }
                    match NotificationAction::from_key(key, id) {
                        Some(action) => {
                            if sender.send(action).is_err() {
                                debug!(notification_id = id, "Action receiver is gone");
                            }
                        }
                        None => warn!(notification_id = id, key, "Unknown notification action"),
                    }
                });
            });
        }

        Ok(id)
    }

    fn close(&self) -> NotifyResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
