mod error;
mod server;
mod types;

pub use error::{FileshareErrorCode, ServiceError, ServiceErrorCode, ServiceResult};
pub use server::{NotifierFactory, ServiceLimits, StatusStream, TransferService};
pub use types::{AcceptRequest, ListResponse, SendRequest, SetNotificationsStatus, StatusResponse};
