//! Inode numbers for kernel bindings.
//!
//! Kernel file system bindings address nodes by 64-bit inode instead of by
//! path. [`InodeTable`] hands out a stable number per canonical path and
//! maps it back. Numbers are never reused, so an inode whose node was
//! deleted through the control channel simply resolves to a path the
//! namespace no longer has.

use std::collections::HashMap;

/// Inode number of the root directory.
pub const ROOT_INODE: u64 = 1;

/// Bidirectional mapping between inode numbers and canonical paths.
#[derive(Debug)]
pub struct InodeTable {
    by_path: HashMap<String, u64>,
    by_inode: HashMap<u64, String>,
    next: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Creates a table holding only the root.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            by_path: HashMap::new(),
            by_inode: HashMap::new(),
            next: ROOT_INODE + 1,
        };
        table.by_path.insert("/".to_string(), ROOT_INODE);
        table.by_inode.insert(ROOT_INODE, "/".to_string());
        table
    }

    /// Returns the inode of `path`, assigning a new one on first sight.
    pub fn get_or_assign(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_path.insert(path.to_string(), ino);
        self.by_inode.insert(ino, path.to_string());
        ino
    }

    /// The path an inode was assigned to.
    #[must_use]
    pub fn path(&self, ino: u64) -> Option<&str> {
        self.by_inode.get(&ino).map(String::as_str)
    }

    /// Inode of `path`'s parent directory; the root is its own parent.
    #[must_use]
    pub fn parent(&self, path: &str) -> u64 {
        match path.rfind('/') {
            Some(0) | None => ROOT_INODE,
            Some(idx) => self.by_path.get(&path[..idx]).copied().unwrap_or(ROOT_INODE),
        }
    }

    /// Canonical path of `name` inside the directory with inode `parent`.
    #[must_use]
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        let dir = self.path(parent)?;
        Some(if dir == "/" {
            format!("/{name}")
        } else {
            format!("{dir}/{name}")
        })
    }

    /// Number of assigned inodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    /// Always `false`; the root is permanent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }
}
