mod local;

pub use local::{StdFilesystem, StdOsInfo};

use std::io;
use std::path::Path;

const OWNER_WRITE: u32 = 0o200;
const GROUP_WRITE: u32 = 0o020;
const OTHER_WRITE: u32 = 0o002;

/// Subset of file metadata the accept workflow needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub is_symlink: bool,
    pub uid: u32,
    pub gid: u32,
    /// Permission bits, `0o777` mask
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait Filesystem: Send + Sync {
    /// Metadata without following symlinks
    fn lstat(&self, path: &Path) -> io::Result<FileInfo>;

    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Bytes available to an unprivileged user on the filesystem holding `path`
    fn available_space(&self, path: &Path) -> io::Result<u64>;

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
}

/// Identity of the user running the daemon
pub trait OsInfo: Send + Sync {
    fn current_uid(&self) -> u32;

    /// Primary and supplementary group IDs
    fn group_ids(&self) -> io::Result<Vec<u32>>;
}

/// Write permission check against the owner, group and other bits, in that order.
///
/// Only the first class the user falls into is consulted, the same way the kernel
/// evaluates permissions for a non-root user.
pub fn is_writable(info: &FileInfo, uid: u32, gids: &[u32]) -> bool {
    if info.uid == uid {
        return info.mode & OWNER_WRITE != 0;
    }
    if gids.contains(&info.gid) {
        return info.mode & GROUP_WRITE != 0;
    }
    info.mode & OTHER_WRITE != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(uid: u32, gid: u32, mode: u32) -> FileInfo {
        FileInfo {
            is_dir: true,
            is_symlink: false,
            uid,
            gid,
            mode,
        }
    }

    #[test]
    fn test_owner_bits() {
        assert!(is_writable(&info(1000, 1000, 0o755), 1000, &[1000]));
        assert!(!is_writable(&info(1000, 1000, 0o577), 1000, &[1000]));
    }

    #[test]
    fn test_group_bits() {
        assert!(is_writable(&info(0, 27, 0o575), 1000, &[1000, 27]));
        assert!(!is_writable(&info(0, 27, 0o757), 1000, &[1000, 27]));
    }

    #[test]
    fn test_other_bits() {
        assert!(is_writable(&info(0, 0, 0o777), 1000, &[1000]));
        assert!(!is_writable(&info(0, 0, 0o775), 1000, &[1000]));
    }
}
