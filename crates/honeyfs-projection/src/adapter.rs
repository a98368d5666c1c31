//! [`FilesystemOps`] over a shared [`Namespace`].
//!
//! Metadata is answered straight from the namespace on every call; the
//! adapter caches nothing but the table of open handles. Opens and first
//! reads are recorded through the [`AccessLogger`].

use crate::access::{AccessLogger, AccessOp};
use crate::ops::{DirEntry, Errno, FileAttr, FileHandle, FilesystemOps, OpResult};
use honeyfs_core::{Error, NodePath};
use honeyfs_namespace::Namespace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

#[derive(Debug)]
struct OpenFile {
    path: String,
    read_logged: bool,
}

/// Translates host filesystem callbacks into namespace operations.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use honeyfs_namespace::NamespaceBuilder;
/// use honeyfs_projection::{AccessLogger, FilesystemOps, ProjectionAdapter};
///
/// let ns = Arc::new(
///     NamespaceBuilder::new()
///         .add_file("/Documents/passwords.txt", "admin:hunter2")
///         .build()
///         .unwrap(),
/// );
/// let fs = ProjectionAdapter::new(ns, AccessLogger::new());
///
/// let names: Vec<_> = fs.readdir("/Documents").unwrap().into_iter().map(|e| e.name).collect();
/// assert_eq!(names, vec![".", "..", "passwords.txt"]);
///
/// let fh = fs.open(r"\Documents\passwords.txt").unwrap();
/// assert_eq!(fs.read("/Documents/passwords.txt", 5, 0, Some(fh)).unwrap(), b"admin");
/// fs.release("/Documents/passwords.txt", fh).unwrap();
/// ```
#[derive(Debug)]
pub struct ProjectionAdapter {
    namespace: Arc<Namespace>,
    logger: AccessLogger,
    next_handle: AtomicU64,
    handles: Mutex<HashMap<FileHandle, OpenFile>>,
}

impl ProjectionAdapter {
    /// Creates an adapter over `namespace`.
    #[must_use]
    pub fn new(namespace: Arc<Namespace>, logger: AccessLogger) -> Self {
        Self {
            namespace,
            logger,
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The namespace being projected.
    #[must_use]
    pub const fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Number of handles not yet released.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    fn allocate(&self, path: String) -> FileHandle {
        let fh = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().insert(
            fh,
            OpenFile {
                path,
                read_logged: false,
            },
        );
        fh
    }

    /// Returns `true` if this read is the one to record: the first offset-0
    /// read on a known handle, or any offset-0 read without one.
    fn should_log_read(&self, offset: u64, fh: Option<FileHandle>) -> bool {
        if offset != 0 {
            return false;
        }
        let mut handles = self.handles.lock();
        match fh.and_then(|fh| handles.get_mut(&fh)) {
            Some(open) if open.read_logged => false,
            Some(open) => {
                open.read_logged = true;
                true
            }
            None => true,
        }
    }

    /// Maps a content error, turning "is a directory" into `EISDIR`.
    fn content_errno(&self, path: &str, err: &Error) -> Errno {
        if err.is_invalid_path() && self.namespace.stat(path).is_ok_and(|m| m.is_dir()) {
            Errno::EISDIR
        } else {
            Errno::from(err)
        }
    }
}

fn display_path(raw: &str) -> String {
    NodePath::new(raw).map_or_else(|_| raw.to_string(), NodePath::into_inner)
}

impl FilesystemOps for ProjectionAdapter {
    fn getattr(&self, path: &str) -> OpResult<FileAttr> {
        let meta = self.namespace.stat(path)?;
        Ok(FileAttr::from(&meta))
    }

    fn readdir(&self, path: &str) -> OpResult<Vec<DirEntry>> {
        let meta = self.namespace.stat(path)?;
        if !meta.is_dir() {
            return Err(Errno::ENOTDIR);
        }

        let children = self.namespace.list_entries(path)?;
        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push(DirEntry::dir("."));
        entries.push(DirEntry::dir(".."));
        entries.extend(children.into_iter().filter_map(|child| {
            child.path.file_name().map(|name| DirEntry {
                name: name.to_string(),
                kind: child.kind,
            })
        }));
        Ok(entries)
    }

    fn open(&self, path: &str) -> OpResult<FileHandle> {
        let meta = self.namespace.stat(path)?;
        let canonical = meta.path.into_inner();
        self.logger.record(AccessOp::Open, &canonical);
        let fh = self.allocate(canonical);
        trace!(fh, "opened handle");
        Ok(fh)
    }

    fn read(
        &self,
        path: &str,
        size: u32,
        offset: u64,
        fh: Option<FileHandle>,
    ) -> OpResult<Vec<u8>> {
        if self.should_log_read(offset, fh) {
            self.logger.record(AccessOp::Read, &display_path(path));
        }

        self.namespace
            .read(path, offset, usize::try_from(size).unwrap_or(usize::MAX))
            .map_err(|e| self.content_errno(path, &e))
    }

    fn write(
        &self,
        path: &str,
        data: &[u8],
        offset: u64,
        _fh: Option<FileHandle>,
    ) -> OpResult<u32> {
        let written = self
            .namespace
            .write(path, offset, data)
            .map_err(|e| self.content_errno(path, &e))?;

        if offset == 0 {
            self.logger.record(AccessOp::Write, &display_path(path));
        }
        Ok(u32::try_from(written).unwrap_or(u32::MAX))
    }

    fn create(&self, path: &str, mode: u32) -> OpResult<FileHandle> {
        let meta = self
            .namespace
            .create_file_with_mode(path, Vec::new(), mode)?;
        let canonical = meta.path.into_inner();
        self.logger.record(AccessOp::Create, &canonical);
        Ok(self.allocate(canonical))
    }

    fn release(&self, _path: &str, fh: FileHandle) -> OpResult<()> {
        if let Some(open) = self.handles.lock().remove(&fh) {
            debug!(fh, path = %open.path, "released handle");
        }
        Ok(())
    }
}
