//! The filesystem callback interface a host driver calls into.
//!
//! A FUSE binding, a ProjFS provider, or a test harness drives the
//! namespace through [`FilesystemOps`] and gets platform error numbers back,
//! never honeyfs error types.

use chrono::{DateTime, Utc};
use honeyfs_core::{Error, ErrorKind, NodeKind, NodeMeta};
use std::fmt;

/// A platform `errno` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// No such file or directory.
    pub const ENOENT: Self = Self(libc::ENOENT);
    /// Directory not empty.
    pub const ENOTEMPTY: Self = Self(libc::ENOTEMPTY);
    /// Invalid argument.
    pub const EINVAL: Self = Self(libc::EINVAL);
    /// Is a directory.
    pub const EISDIR: Self = Self(libc::EISDIR);
    /// Not a directory.
    pub const ENOTDIR: Self = Self(libc::ENOTDIR);
    /// Bad file handle.
    pub const EBADF: Self = Self(libc::EBADF);
    /// I/O error.
    pub const EIO: Self = Self(libc::EIO);

    /// The raw error number.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

impl From<&Error> for Errno {
    fn from(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::ENOENT,
            ErrorKind::NotEmpty => Self::ENOTEMPTY,
            ErrorKind::InvalidPath | ErrorKind::Config => Self::EINVAL,
            ErrorKind::Protocol | ErrorKind::Transport => Self::EIO,
        }
    }
}

impl From<Error> for Errno {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

/// Result of a filesystem callback.
pub type OpResult<T> = std::result::Result<T, Errno>;

/// Opaque handle returned by `open`/`create` and passed back to `read`,
/// `write` and `release`.
pub type FileHandle = u64;

/// Attributes answered to `getattr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Directory or regular file
    pub kind: NodeKind,
    /// Type and permission bits
    pub mode: u32,
    /// Content length in bytes
    pub size: u64,
    /// Link count: 2 for directories, 1 for files
    pub nlink: u32,
    /// Modification time
    pub mtime: DateTime<Utc>,
}

impl From<&NodeMeta> for FileAttr {
    fn from(meta: &NodeMeta) -> Self {
        Self {
            kind: meta.kind,
            mode: meta.mode,
            size: meta.size,
            nlink: if meta.is_dir() { 2 } else { 1 },
            mtime: meta.modified,
        }
    }
}

/// One `readdir` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, including the synthetic `.` and `..`
    pub name: String,
    /// Entry kind
    pub kind: NodeKind,
}

impl DirEntry {
    pub(crate) fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
        }
    }
}

/// Filesystem callbacks consumed from the host platform.
///
/// Paths are whatever the host passes; implementations canonicalise them.
pub trait FilesystemOps: Send + Sync {
    /// Attributes of the node at `path`.
    ///
    /// # Errors
    ///
    /// [`Errno::ENOENT`] if absent.
    fn getattr(&self, path: &str) -> OpResult<FileAttr>;

    /// Directory entries, `.` and `..` first.
    ///
    /// # Errors
    ///
    /// [`Errno::ENOENT`] if absent, [`Errno::ENOTDIR`] for a file.
    fn readdir(&self, path: &str) -> OpResult<Vec<DirEntry>>;

    /// Opens a node and returns a handle.
    ///
    /// # Errors
    ///
    /// [`Errno::ENOENT`] if absent.
    fn open(&self, path: &str) -> OpResult<FileHandle>;

    /// Reads up to `size` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// [`Errno::ENOENT`] if absent, [`Errno::EISDIR`] for a directory.
    fn read(&self, path: &str, size: u32, offset: u64, fh: Option<FileHandle>) -> OpResult<Vec<u8>>;

    /// Writes `data` at `offset` and returns the byte count accepted.
    ///
    /// # Errors
    ///
    /// [`Errno::ENOENT`] if absent, [`Errno::EISDIR`] for a directory.
    fn write(&self, path: &str, data: &[u8], offset: u64, fh: Option<FileHandle>) -> OpResult<u32>;

    /// Creates an empty file with `mode` and returns an open handle.
    ///
    /// # Errors
    ///
    /// [`Errno::EINVAL`] if the path conflicts with an existing node.
    fn create(&self, path: &str, mode: u32) -> OpResult<FileHandle>;

    /// Closes a handle. Unknown handles are ignored.
    ///
    /// # Errors
    ///
    /// Implementations currently never fail.
    fn release(&self, path: &str, fh: FileHandle) -> OpResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeyfs_core::NodePath;
    use honeyfs_core::node::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};

    #[test]
    fn test_errno_mapping() {
        let not_found = Error::NotFound { path: "/x".into() };
        let not_empty = Error::NotEmpty { path: "/d".into() };
        let invalid = Error::invalid_path("/a//b", "empty path segment");

        assert_eq!(Errno::from(&not_found), Errno::ENOENT);
        assert_eq!(Errno::from(not_empty), Errno::ENOTEMPTY);
        assert_eq!(Errno::from(invalid), Errno::EINVAL);
        assert_eq!(Errno::from(Error::protocol("bad frame")), Errno::EIO);
    }

    #[test]
    fn test_attr_from_meta() {
        let now = Utc::now();
        let dir = NodeMeta {
            path: NodePath::new("/d").unwrap(),
            kind: NodeKind::Directory,
            mode: DEFAULT_DIR_MODE,
            size: 0,
            modified: now,
        };
        let file = NodeMeta {
            path: NodePath::new("/d/f").unwrap(),
            kind: NodeKind::File,
            mode: DEFAULT_FILE_MODE,
            size: 42,
            modified: now,
        };

        assert_eq!(FileAttr::from(&dir).nlink, 2);
        let attr = FileAttr::from(&file);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.size, 42);
        assert_eq!(attr.mode, DEFAULT_FILE_MODE);
        assert_eq!(attr.mtime, now);
    }

    #[test]
    fn test_errno_code() {
        assert_eq!(Errno::ENOENT.code(), libc::ENOENT);
    }
}
