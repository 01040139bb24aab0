use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification could not be shown: {0}")]
    Delivery(String),

    #[error("Notifier is closed")]
    Closed,
}

pub type NotifyResult<T> = Result<T, NotifyError>;
