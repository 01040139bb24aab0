mod error;
mod live;
mod manager;

pub use error::{EventManagerError, EventManagerResult};
pub use live::LiveTransfer;
pub use manager::{EventManager, ProgressReceiver};
