//! Node metadata shared by the namespace and its consumers.

use crate::path::NodePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File type bits for a directory.
pub const S_IFDIR: u32 = 0o040_000;
/// File type bits for a regular file.
pub const S_IFREG: u32 = 0o100_000;
/// Mask selecting the file type bits of a mode.
pub const S_IFMT: u32 = 0o170_000;

/// Default mode for directories (`drwxr-xr-x`).
pub const DEFAULT_DIR_MODE: u32 = S_IFDIR | 0o755;
/// Default mode for files (`-rw-r--r--`).
pub const DEFAULT_FILE_MODE: u32 = S_IFREG | 0o644;

/// Kind of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A directory
    Directory,
    /// A regular file
    File,
}

impl NodeKind {
    /// Type bits for this kind.
    #[must_use]
    pub const fn type_bits(self) -> u32 {
        match self {
            Self::Directory => S_IFDIR,
            Self::File => S_IFREG,
        }
    }

    /// Forces `mode` to carry this kind's type bits, keeping the permission
    /// bits the caller supplied.
    ///
    /// # Examples
    ///
    /// ```
    /// use honeyfs_core::node::{NodeKind, S_IFREG};
    ///
    /// assert_eq!(NodeKind::File.apply_to(0o600), S_IFREG | 0o600);
    /// ```
    #[must_use]
    pub const fn apply_to(self, mode: u32) -> u32 {
        (mode & !S_IFMT) | self.type_bits()
    }
}

/// Which children `list_children` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListFilter {
    /// Regular files only
    Files,
    /// Directories only
    Directories,
    /// Both
    #[default]
    All,
}

impl ListFilter {
    /// Returns `true` if a node of `kind` passes the filter.
    #[must_use]
    pub const fn admits(self, kind: NodeKind) -> bool {
        match self {
            Self::All => true,
            Self::Files => matches!(kind, NodeKind::File),
            Self::Directories => matches!(kind, NodeKind::Directory),
        }
    }
}

/// Point-in-time metadata of a node, detached from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeMeta {
    /// Canonical path
    pub path: NodePath,
    /// Directory or file
    pub kind: NodeKind,
    /// Type and permission bits
    pub mode: u32,
    /// Content length in bytes (0 for directories)
    pub size: u64,
    /// Last creation or overwrite time
    pub modified: DateTime<Utc>,
}

impl NodeMeta {
    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    /// Returns `true` for regular files.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File)
    }

    /// Permission bits without the file type.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }
}
