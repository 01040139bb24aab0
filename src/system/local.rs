use crate::system::{DirEntry, FileInfo, Filesystem, OsInfo};
use std::ffi::CString;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

fn file_info(metadata: &Metadata) -> FileInfo {
    FileInfo {
        is_dir: metadata.is_dir(),
        is_symlink: metadata.file_type().is_symlink(),
        uid: metadata.uid(),
        gid: metadata.gid(),
        mode: metadata.mode() & 0o777,
    }
}

/// Filesystem backed by the local OS
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        fs::symlink_metadata(path).map(|m| file_info(&m))
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        fs::metadata(path).map(|m| file_info(&m))
    }

    fn available_space(&self, path: &Path) -> io::Result<u64> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdOsInfo;

impl OsInfo for StdOsInfo {
    fn current_uid(&self) -> u32 {
        unsafe { libc::getuid() }
    }

    fn group_ids(&self) -> io::Result<Vec<u32>> {
        let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
        if count < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut groups: Vec<libc::gid_t> = vec![0; count as usize];
        let count = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
        if count < 0 {
            return Err(io::Error::last_os_error());
        }
        groups.truncate(count as usize);

        let primary = unsafe { libc::getgid() };
        if !groups.contains(&primary) {
            groups.push(primary);
        }
        Ok(groups)
    }
}
