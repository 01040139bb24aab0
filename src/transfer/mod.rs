mod status;
mod types;

pub use status::{
    file_status_summary, get_new_transfer_status, new_transfer_status, transfer_status_text,
};
pub use types::{
    is_file_selected, Direction, File, Status, Transfer, TransferProgressInfo,
    MULTIPLE_FILES_PATH,
};
