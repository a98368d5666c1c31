//! The namespace store.
//!
//! A single ordered map from canonical path to node, guarded by one mutex.
//! Every operation that reads and then writes (ancestor materialisation,
//! delete-with-emptiness-check) runs entirely under that lock, so concurrent
//! callers always observe some serial order of whole operations.
//!
//! # Examples
//!
//! ```
//! use honeyfs_core::ListFilter;
//! use honeyfs_namespace::Namespace;
//!
//! let ns = Namespace::new();
//! ns.create_file(r"\Documents\passwords.txt", b"hunter2".to_vec()).unwrap();
//!
//! let dirs = ns.list_children("/", ListFilter::Directories).unwrap();
//! assert_eq!(dirs, vec!["Documents"]);
//! assert_eq!(ns.read("/Documents/passwords.txt", 0, 64).unwrap(), b"hunter2");
//! ```

use chrono::{DateTime, Utc};
use honeyfs_core::config::DEFAULT_MAX_FILE_BYTES;
use honeyfs_core::node::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use honeyfs_core::{Error, ListFilter, NodeKind, NodeMeta, NodePath, Result, WriteRetention};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::debug;

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    mode: u32,
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

impl Node {
    const fn directory(modified: DateTime<Utc>) -> Self {
        Self {
            kind: NodeKind::Directory,
            mode: DEFAULT_DIR_MODE,
            content: Vec::new(),
            modified,
        }
    }

    const fn file(content: Vec<u8>, mode: u32, modified: DateTime<Utc>) -> Self {
        Self {
            kind: NodeKind::File,
            mode: NodeKind::File.apply_to(mode),
            content,
            modified,
        }
    }

    fn meta(&self, path: &NodePath) -> NodeMeta {
        NodeMeta {
            path: path.clone(),
            kind: self.kind,
            mode: self.mode,
            size: self.content.len() as u64,
            modified: self.modified,
        }
    }
}

type NodeMap = BTreeMap<NodePath, Node>;

/// In-memory hierarchical namespace of decoy nodes.
///
/// The root directory always exists. Share one instance between the
/// projection adapter and the control server behind an `Arc`.
///
/// # Thread Safety
///
/// This type is `Send` and `Sync`; all methods take `&self`.
#[derive(Debug)]
pub struct Namespace {
    nodes: Mutex<NodeMap>,
    retention: WriteRetention,
    max_file_bytes: usize,
}

impl Namespace {
    /// Creates a namespace holding only the root directory, discarding
    /// projected writes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(WriteRetention::Discard)
    }

    /// Creates an empty namespace with the given write retention policy.
    #[must_use]
    pub fn with_retention(retention: WriteRetention) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodePath::root(), Node::directory(Utc::now()));
        Self {
            nodes: Mutex::new(nodes),
            retention,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Caps the size a retained write may grow a file to.
    #[must_use]
    pub const fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// The write retention policy in force.
    #[must_use]
    pub const fn retention(&self) -> WriteRetention {
        self.retention
    }

    /// Largest size a retained write may grow a file to.
    #[must_use]
    pub const fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    /// Creates a directory and any missing ancestors.
    ///
    /// Succeeds without change if the directory already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the path is malformed or it or any
    /// ancestor exists as a file.
    pub fn create_directory(&self, path: impl AsRef<str>) -> Result<NodeMeta> {
        self.insert_directory(path, None)
    }

    /// Like [`create_directory`](Self::create_directory) with an explicit
    /// modification time, applied to the directory and to any ancestors it
    /// materialises. An existing directory takes the new time.
    ///
    /// # Errors
    ///
    /// See [`create_directory`](Self::create_directory).
    pub fn create_directory_at(
        &self,
        path: impl AsRef<str>,
        modified: DateTime<Utc>,
    ) -> Result<NodeMeta> {
        self.insert_directory(path, Some(modified))
    }

    fn insert_directory(
        &self,
        path: impl AsRef<str>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<NodeMeta> {
        let path = NodePath::new(path)?;
        let mut nodes = self.nodes.lock();

        check_ancestry(&nodes, &path)?;
        if let Some(existing) = nodes.get_mut(&path) {
            if existing.kind == NodeKind::File {
                return Err(Error::invalid_path(path.as_str(), "exists as a file"));
            }
            if let Some(modified) = modified {
                existing.modified = modified;
            }
            return Ok(existing.meta(&path));
        }

        let modified = modified.unwrap_or_else(Utc::now);
        materialize_ancestors(&mut nodes, &path, modified);
        let node = Node::directory(modified);
        let meta = node.meta(&path);
        nodes.insert(path, node);
        debug!(path = %meta.path, "created directory");
        Ok(meta)
    }

    /// Creates or overwrites a file, materialising missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the path is malformed, names the
    /// root or an existing directory, or an ancestor exists as a file.
    pub fn create_file(&self, path: impl AsRef<str>, content: Vec<u8>) -> Result<NodeMeta> {
        self.create_file_with_mode(path, content, DEFAULT_FILE_MODE)
    }

    /// Like [`create_file`](Self::create_file) with explicit permission
    /// bits. The file type bits of `mode` are forced to "regular file".
    ///
    /// Overwriting keeps the node's place in the tree and replaces its
    /// content and mode.
    ///
    /// # Errors
    ///
    /// See [`create_file`](Self::create_file).
    pub fn create_file_with_mode(
        &self,
        path: impl AsRef<str>,
        content: Vec<u8>,
        mode: u32,
    ) -> Result<NodeMeta> {
        self.insert_file(path, content, mode, Utc::now())
    }

    /// Like [`create_file`](Self::create_file) with an explicit
    /// modification time. Ancestors materialised on the way take the same
    /// time.
    ///
    /// # Errors
    ///
    /// See [`create_file`](Self::create_file).
    pub fn create_file_at(
        &self,
        path: impl AsRef<str>,
        content: Vec<u8>,
        modified: DateTime<Utc>,
    ) -> Result<NodeMeta> {
        self.insert_file(path, content, DEFAULT_FILE_MODE, modified)
    }

    fn insert_file(
        &self,
        path: impl AsRef<str>,
        content: Vec<u8>,
        mode: u32,
        modified: DateTime<Utc>,
    ) -> Result<NodeMeta> {
        let path = NodePath::new(path)?;
        if path.is_root() {
            return Err(Error::invalid_path("/", "the root is a directory"));
        }

        let mut nodes = self.nodes.lock();
        check_ancestry(&nodes, &path)?;
        if nodes
            .get(&path)
            .is_some_and(|n| n.kind == NodeKind::Directory)
        {
            return Err(Error::invalid_path(path.as_str(), "exists as a directory"));
        }

        materialize_ancestors(&mut nodes, &path, modified);
        let node = Node::file(content, mode, modified);
        let meta = node.meta(&path);
        nodes.insert(path, node);
        debug!(path = %meta.path, size = meta.size, "created file");
        Ok(meta)
    }

    /// Removes a single node.
    ///
    /// Directories must be empty; there is no recursive delete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent, [`Error::NotEmpty`] for a
    /// directory with children, and [`Error::InvalidPath`] for the root or
    /// a malformed path.
    pub fn delete(&self, path: impl AsRef<str>) -> Result<NodeMeta> {
        let path = NodePath::new(path)?;
        if path.is_root() {
            return Err(Error::invalid_path("/", "the root cannot be deleted"));
        }

        let mut nodes = self.nodes.lock();
        let kind = nodes
            .get(&path)
            .map(|n| n.kind)
            .ok_or_else(|| not_found(&path))?;

        if kind == NodeKind::Directory && has_children(&nodes, &path) {
            return Err(Error::NotEmpty {
                path: path.into_inner(),
            });
        }

        let node = nodes.remove(&path).ok_or_else(|| not_found(&path))?;
        debug!(path = %path, "deleted node");
        Ok(node.meta(&path))
    }

    /// Returns a metadata snapshot of the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent.
    pub fn stat(&self, path: impl AsRef<str>) -> Result<NodeMeta> {
        let path = NodePath::new(path)?;
        let nodes = self.nodes.lock();
        nodes
            .get(&path)
            .map(|n| n.meta(&path))
            .ok_or_else(|| not_found(&path))
    }

    /// Returns `true` if a node exists at `path`.
    ///
    /// Malformed paths do not exist.
    #[must_use]
    pub fn exists(&self, path: impl AsRef<str>) -> bool {
        NodePath::new(path).is_ok_and(|p| self.nodes.lock().contains_key(&p))
    }

    /// Names of the direct children of a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `path` is absent or is a file.
    pub fn list_children(&self, path: impl AsRef<str>, filter: ListFilter) -> Result<Vec<String>> {
        let dir = NodePath::new(path)?;
        let nodes = self.nodes.lock();

        match nodes.get(&dir) {
            Some(n) if n.kind == NodeKind::Directory => {}
            _ => return Err(not_found(&dir)),
        }

        let names = descendants(&nodes, &dir)
            .filter(|(_, node)| filter.admits(node.kind))
            .filter_map(|(p, _)| p.name_under(&dir).map(str::to_string))
            .collect();
        Ok(names)
    }

    /// Metadata of the direct children of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `path` is absent or is a file.
    pub fn list_entries(&self, path: impl AsRef<str>) -> Result<Vec<NodeMeta>> {
        let dir = NodePath::new(path)?;
        let nodes = self.nodes.lock();

        match nodes.get(&dir) {
            Some(n) if n.kind == NodeKind::Directory => {}
            _ => return Err(not_found(&dir)),
        }

        Ok(descendants(&nodes, &dir)
            .filter(|(p, _)| p.name_under(&dir).is_some())
            .map(|(p, n)| n.meta(p))
            .collect())
    }

    /// Reads up to `length` bytes starting at `offset`.
    ///
    /// The slice is clipped to the file's size; an offset at or past the end
    /// yields an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent and [`Error::InvalidPath`] for
    /// a directory.
    pub fn read(&self, path: impl AsRef<str>, offset: u64, length: usize) -> Result<Vec<u8>> {
        let path = NodePath::new(path)?;
        let nodes = self.nodes.lock();
        let node = nodes.get(&path).ok_or_else(|| not_found(&path))?;
        if node.kind == NodeKind::Directory {
            return Err(Error::invalid_path(path.as_str(), "is a directory"));
        }

        let size = node.content.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(size);
        let end = start.saturating_add(length).min(size);
        Ok(node.content[start..end].to_vec())
    }

    /// Accepts a write at `offset` and reports `data.len()` bytes written.
    ///
    /// Whether the bytes are kept depends on the namespace's
    /// [`WriteRetention`]. Under [`WriteRetention::Retain`], gaps past the
    /// current end are zero-filled and the file may not grow past
    /// [`max_file_bytes`](Self::max_file_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent and [`Error::InvalidPath`] for
    /// a directory or, when retaining, a write ending past the size limit.
    pub fn write(&self, path: impl AsRef<str>, offset: u64, data: &[u8]) -> Result<usize> {
        let path = NodePath::new(path)?;
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(&path).ok_or_else(|| not_found(&path))?;
        if node.kind == NodeKind::Directory {
            return Err(Error::invalid_path(path.as_str(), "is a directory"));
        }

        if self.retention == WriteRetention::Retain {
            let end = usize::try_from(offset)
                .ok()
                .and_then(|start| start.checked_add(data.len()))
                .filter(|end| *end <= self.max_file_bytes)
                .ok_or_else(|| {
                    Error::invalid_path(
                        path.as_str(),
                        format!("write exceeds maximum file size of {} bytes", self.max_file_bytes),
                    )
                })?;
            let start = end - data.len();
            if node.content.len() < end {
                node.content.resize(end, 0);
            }
            node.content[start..end].copy_from_slice(data);
            node.modified = Utc::now();
        }

        Ok(data.len())
    }

    /// Number of nodes, excluding the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.lock().len() - 1
    }

    /// Returns `true` if only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every canonical path in the namespace, sorted, root included.
    #[must_use]
    pub fn paths(&self) -> Vec<NodePath> {
        self.nodes.lock().keys().cloned().collect()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &NodePath) -> Error {
    Error::NotFound {
        path: path.as_str().to_string(),
    }
}

/// Fails if any proper ancestor of `path` exists as a file.
fn check_ancestry(nodes: &NodeMap, path: &NodePath) -> Result<()> {
    for ancestor in path.ancestors() {
        if nodes
            .get(&ancestor)
            .is_some_and(|n| n.kind == NodeKind::File)
        {
            return Err(Error::invalid_path(
                path.as_str(),
                format!("ancestor {ancestor} is a file"),
            ));
        }
    }
    Ok(())
}

/// Inserts every missing ancestor directory. Call after `check_ancestry`.
fn materialize_ancestors(nodes: &mut NodeMap, path: &NodePath, modified: DateTime<Utc>) {
    for ancestor in path.ancestors() {
        nodes
            .entry(ancestor)
            .or_insert_with(|| Node::directory(modified));
    }
}

/// All strict descendants of `dir`, in path order.
fn descendants<'a>(
    nodes: &'a NodeMap,
    dir: &NodePath,
) -> impl Iterator<Item = (&'a NodePath, &'a Node)> + 'a {
    let prefix = dir.child_prefix();
    nodes
        .range::<str, _>((Bound::Excluded(prefix.as_str()), Bound::Unbounded))
        .take_while(move |(p, _)| p.as_str().starts_with(&prefix))
}

fn has_children(nodes: &NodeMap, dir: &NodePath) -> bool {
    descendants(nodes, dir).next().is_some()
}
