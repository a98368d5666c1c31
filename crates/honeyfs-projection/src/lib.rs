//! Filesystem projection and access logging for honeyfs.
//!
//! The host platform (a FUSE binding, a ProjFS provider) calls the
//! [`FilesystemOps`] methods of a [`ProjectionAdapter`]; the adapter answers
//! from the shared namespace and records opens and first reads through an
//! [`AccessLogger`]. Observers registered on the logger, such as a
//! [`ThrottledObserver`] around an [`AlertObserver`], receive every event.
//!
//! With the `fuse` feature, [`fuse::spawn_mount`] mounts the adapter as a
//! real file system through `fuser`; [`InodeTable`] supplies the inode
//! numbers such kernel bindings address nodes by.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod access;
pub mod adapter;
pub mod alert;
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod inode;
pub mod ops;

pub use access::{
    ACCESS_TARGET, AccessEvent, AccessLogger, AccessObserver, AccessOp, ObserverError,
};
pub use adapter::ProjectionAdapter;
pub use alert::{ALERT_TARGET, AlertObserver, DEFAULT_ALERT_WINDOW, ThrottledObserver};
pub use inode::{InodeTable, ROOT_INODE};
pub use ops::{DirEntry, Errno, FileAttr, FileHandle, FilesystemOps, OpResult};
