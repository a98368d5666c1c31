//! Kernel mount of a [`ProjectionAdapter`] through `fuser`.
//!
//! Only built with the `fuse` feature. Every callback resolves its inode to
//! a canonical path and goes through the adapter, so access logging and
//! alerting behave exactly as for any other host driver.

use crate::adapter::ProjectionAdapter;
use crate::inode::InodeTable;
use crate::ops::{Errno, FileAttr, FilesystemOps};
use honeyfs_core::NodeKind;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Kernel attribute cache lifetime. Short, so control channel changes show
/// up promptly.
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 512;

/// `fuser` file system over a shared adapter.
pub struct FuseProjection {
    adapter: Arc<ProjectionAdapter>,
    inodes: InodeTable,
    uid: u32,
    gid: u32,
}

impl FuseProjection {
    /// Wraps `adapter`; every node is reported as owned by `uid:gid`.
    #[must_use]
    pub fn new(adapter: Arc<ProjectionAdapter>, uid: u32, gid: u32) -> Self {
        Self {
            adapter,
            inodes: InodeTable::new(),
            uid,
            gid,
        }
    }

    fn kernel_attr(&self, ino: u64, attr: &FileAttr) -> fuser::FileAttr {
        let mtime = SystemTime::from(attr.mtime);
        fuser::FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind: file_type(attr.kind),
            perm: u16::try_from(attr.mode & 0o7777).unwrap_or(0o644),
            nlink: attr.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE,
        }
    }

    fn path(&self, ino: u64) -> Result<String, Errno> {
        self.inodes.path(ino).map(str::to_string).ok_or(Errno::ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<String, Errno> {
        let name = name.to_str().ok_or(Errno::EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(Errno::ENOENT)
    }

    /// Looks `path` up through the adapter and assigns it an inode.
    fn entry(&mut self, path: &str) -> Result<fuser::FileAttr, Errno> {
        let attr = self.adapter.getattr(path)?;
        let ino = self.inodes.get_or_assign(path);
        Ok(self.kernel_attr(ino, &attr))
    }
}

impl fmt::Debug for FuseProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuseProjection")
            .field("inodes", &self.inodes.len())
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .finish_non_exhaustive()
    }
}

const fn file_type(kind: NodeKind) -> fuser::FileType {
    match kind {
        NodeKind::Directory => fuser::FileType::Directory,
        NodeKind::File => fuser::FileType::RegularFile,
    }
}

fn to_offset(raw: i64) -> Result<u64, Errno> {
    u64::try_from(raw).map_err(|_| Errno::EINVAL)
}

impl fuser::Filesystem for FuseProjection {
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        match self.child(parent, name).and_then(|path| self.entry(&path)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.code()),
        }
    }

    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        let result = self
            .path(ino)
            .and_then(|path| self.adapter.getattr(&path))
            .map(|attr| self.kernel_attr(ino, &attr));
        match result {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.code()),
        }
    }

    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let listing = self.path(ino).and_then(|path| {
            let entries = self.adapter.readdir(&path)?;
            Ok((path, entries))
        });
        let (path, entries) = match listing {
            Ok(listing) => listing,
            Err(e) => {
                reply.error(e.code());
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (idx, entry) in entries.into_iter().enumerate().skip(skip) {
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => self.inodes.parent(&path),
                name => match self.inodes.child_path(ino, name) {
                    Some(child) => self.inodes.get_or_assign(&child),
                    None => continue,
                },
            };
            let next = i64::try_from(idx + 1).unwrap_or(i64::MAX);
            if reply.add(entry_ino, next, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        match self.path(ino).and_then(|path| self.adapter.open(&path)) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.code()),
        }
    }

    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let result = self.path(ino).and_then(|path| {
            let offset = to_offset(offset)?;
            self.adapter.read(&path, size, offset, Some(fh))
        });
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.code()),
        }
    }

    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        let result = self.path(ino).and_then(|path| {
            let offset = to_offset(offset)?;
            self.adapter.write(&path, data, offset, Some(fh))
        });
        match result {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(e.code()),
        }
    }

    fn create(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            let fh = self.adapter.create(&path, mode & !umask)?;
            Ok((self.entry(&path)?, fh))
        });
        match result {
            Ok((attr, fh)) => reply.created(&TTL, &attr, 0, fh, 0),
            Err(e) => reply.error(e.code()),
        }
    }

    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        let path = self.path(ino).unwrap_or_default();
        match self.adapter.release(&path, fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.code()),
        }
    }
}

/// A live mount; the decoy tree is unmounted when this is dropped.
pub struct FuseMount {
    mountpoint: PathBuf,
    _session: fuser::BackgroundSession,
}

impl FuseMount {
    /// Where the tree is mounted.
    #[must_use]
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }
}

impl fmt::Debug for FuseMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuseMount")
            .field("mountpoint", &self.mountpoint)
            .finish_non_exhaustive()
    }
}

impl Drop for FuseMount {
    fn drop(&mut self) {
        debug!(mountpoint = %self.mountpoint.display(), "unmounting decoy tree");
    }
}

/// Mounts `adapter` on `mountpoint` in a background thread.
///
/// Nodes are reported as owned by the owner of `mountpoint`.
///
/// # Errors
///
/// Returns an error if `mountpoint` cannot be inspected or the kernel
/// refuses the mount.
pub fn spawn_mount(adapter: Arc<ProjectionAdapter>, mountpoint: &Path) -> io::Result<FuseMount> {
    let owner = std::fs::metadata(mountpoint)?;
    let fs = FuseProjection::new(adapter, owner.uid(), owner.gid());
    let options = [
        fuser::MountOption::FSName("honeyfs".to_string()),
        fuser::MountOption::AutoUnmount,
    ];
    let session = fuser::spawn_mount2(fs, mountpoint, &options)?;
    info!(mountpoint = %mountpoint.display(), "decoy tree mounted");
    Ok(FuseMount {
        mountpoint: mountpoint.to_path_buf(),
        _session: session,
    })
}
