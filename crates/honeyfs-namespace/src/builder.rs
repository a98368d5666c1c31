//! Builder pattern for populating a namespace at startup.
//!
//! Nodes can be added one by one or bulk-loaded from a JSON manifest:
//!
//! ```json
//! {
//!   "files": [
//!     { "path": "\\Documents\\passwords.txt", "content": "admin:hunter2" },
//!     { "path": "/keys/id_rsa", "content": "LS0tLS1CRUdJTg==", "isBase64": true },
//!     { "path": "/aws/ec2/production.pem", "modified": "2021-03-14T09:26:53Z" },
//!     { "path": "/backups", "directory": true }
//!   ]
//! }
//! ```
//!
//! Paths go through the same canonicalisation as runtime commands. An
//! entry without `modified` is stamped with the load time.
//!
//! # Examples
//!
//! ```
//! use honeyfs_namespace::NamespaceBuilder;
//!
//! let ns = NamespaceBuilder::new()
//!     .add_file(r"\Documents\passwords.txt", "admin:hunter2")
//!     .add_directory("/backups")
//!     .build()
//!     .unwrap();
//!
//! assert!(ns.exists("/Documents"));
//! assert_eq!(ns.len(), 3);
//! ```

use crate::namespace::Namespace;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use honeyfs_core::{Error, Result, WriteRetention};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// One record of a bulk-load manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Path in either separator convention
    pub path: String,

    /// File body; omitted means an empty placeholder
    #[serde(default)]
    pub content: Option<String>,

    /// `content` is base64 rather than UTF-8 text
    #[serde(default)]
    pub is_base64: bool,

    /// Create an empty directory instead of a file
    #[serde(default)]
    pub directory: bool,

    /// Last-modified time reported for the node (RFC 3339)
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

/// A bulk-load manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Records applied in order
    #[serde(default)]
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parses a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not a valid manifest.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::config(format!("invalid manifest: {e}")))
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("invalid manifest {}: {e}", path.display())))
    }
}

/// Builder for constructing a populated [`Namespace`].
///
/// Errors are collected as nodes are added and the first one is returned
/// from [`build`](Self::build), so a chain of calls never needs `?` in the
/// middle.
#[derive(Debug, Default)]
pub struct NamespaceBuilder {
    namespace: Namespace,
    errors: Vec<Error>,
}

impl NamespaceBuilder {
    /// Creates a builder over an empty namespace that discards writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder over an empty namespace with the given retention.
    #[must_use]
    pub fn with_retention(retention: WriteRetention) -> Self {
        Self {
            namespace: Namespace::with_retention(retention),
            errors: Vec::new(),
        }
    }

    /// Caps the size retained writes may grow a file to.
    #[must_use]
    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.namespace = self.namespace.with_max_file_bytes(max_file_bytes);
        self
    }

    /// Adds a file, materialising its ancestors.
    #[must_use]
    pub fn add_file(self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Self {
        self.record(|ns| ns.create_file(path, content.into()))
    }

    /// Adds a directory, materialising its ancestors.
    #[must_use]
    pub fn add_directory(self, path: impl AsRef<str>) -> Self {
        self.record(|ns| ns.create_directory(path))
    }

    /// Applies every record of a manifest in order.
    #[must_use]
    pub fn add_manifest(mut self, manifest: Manifest) -> Self {
        for entry in manifest.files {
            self = self.add_entry(entry);
        }
        self
    }

    /// Reads a manifest file and applies it.
    ///
    /// A file that cannot be read or parsed is recorded as an error and
    /// reported by [`build`](Self::build).
    #[must_use]
    pub fn add_manifest_file(mut self, path: impl AsRef<Path>) -> Self {
        match Manifest::load(path) {
            Ok(manifest) => self.add_manifest(manifest),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    fn add_entry(mut self, entry: ManifestEntry) -> Self {
        if entry.directory {
            return match entry.modified {
                Some(modified) => self.record(|ns| ns.create_directory_at(&entry.path, modified)),
                None => self.add_directory(entry.path),
            };
        }

        let raw = entry.content.unwrap_or_default();
        let content = if entry.is_base64 {
            match STANDARD.decode(raw.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.errors.push(Error::config(format!(
                        "invalid base64 content for {}: {e}",
                        entry.path
                    )));
                    return self;
                }
            }
        } else {
            raw.into_bytes()
        };
        match entry.modified {
            Some(modified) => self.record(|ns| ns.create_file_at(&entry.path, content, modified)),
            None => self.add_file(entry.path, content),
        }
    }

    fn record<T>(mut self, op: impl FnOnce(&Namespace) -> Result<T>) -> Self {
        if let Err(e) = op(&self.namespace) {
            self.errors.push(e);
        }
        self
    }

    /// Number of nodes added so far, excluding the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.namespace.len()
    }

    /// Consumes the builder and returns the namespace.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered while adding nodes, if any.
    pub fn build(self) -> Result<Namespace> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        info!(nodes = self.namespace.len(), "namespace populated");
        Ok(self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeyfs_core::ListFilter;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_empty() {
        let ns = NamespaceBuilder::new().build().unwrap();
        assert!(ns.is_empty());
    }

    #[test]
    fn test_builder_normalizes_paths() {
        let ns = NamespaceBuilder::new()
            .add_file(r"\Documents\a.txt", "a")
            .add_file("Documents/b.txt", "b")
            .build()
            .unwrap();

        assert_eq!(
            ns.list_children("/Documents", ListFilter::Files).unwrap(),
            vec!["a.txt", "b.txt"]
        );
    }

    #[test]
    fn test_builder_collects_first_error() {
        let result = NamespaceBuilder::new()
            .add_file("/valid.txt", "ok")
            .add_file("/a//b", "bad")
            .add_file("/valid.txt/child", "also bad")
            .build();

        assert!(result.unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_node_count_tracks_ancestors() {
        let builder = NamespaceBuilder::new().add_file("/a/b/c.txt", "");
        assert_eq!(builder.node_count(), 3);
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest = Manifest::from_json(
            r#"{"files":[
                {"path":"\\aws\\credentials","content":"[default]"},
                {"path":"/bin.dat","content":"AAEC","isBase64":true},
                {"path":"/placeholder.pem","modified":"2021-03-14T09:26:53Z"},
                {"path":"/empty","directory":true,"modified":"2020-01-01T00:00:00+02:00"}
            ]}"#,
        )
        .unwrap();
        let placed = DateTime::parse_from_rfc3339("2021-03-14T09:26:53Z")
            .unwrap()
            .with_timezone(&Utc);
        let emptied = DateTime::parse_from_rfc3339("2019-12-31T22:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(manifest.files.len(), 4);
        assert!(manifest.files[1].is_base64);
        assert_eq!(manifest.files[2].content, None);
        assert_eq!(manifest.files[0].modified, None);
        assert_eq!(manifest.files[2].modified, Some(placed));

        let ns = NamespaceBuilder::new().add_manifest(manifest).build().unwrap();
        assert_eq!(ns.read("/aws/credentials", 0, 64).unwrap(), b"[default]");
        assert_eq!(ns.read("/bin.dat", 0, 64).unwrap(), vec![0, 1, 2]);
        assert_eq!(ns.stat("/placeholder.pem").unwrap().size, 0);
        assert!(ns.stat("/empty").unwrap().is_dir());
        assert_eq!(ns.stat("/placeholder.pem").unwrap().modified, placed);
        assert_eq!(ns.stat("/empty").unwrap().modified, emptied);
        assert!(ns.stat("/aws/credentials").unwrap().modified > placed);
    }

    #[test]
    fn test_manifest_bad_timestamp() {
        let err = Manifest::from_json(r#"{"files":[{"path":"/x","modified":"last tuesday"}]}"#)
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_size_limit() {
        let ns = NamespaceBuilder::with_retention(WriteRetention::Retain)
            .with_max_file_bytes(8)
            .add_file("/f", "abc")
            .build()
            .unwrap();
        assert_eq!(ns.max_file_bytes(), 8);
        assert!(ns.write("/f", 8, b"x").unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_manifest_bad_base64() {
        let manifest =
            Manifest::from_json(r#"{"files":[{"path":"/x","content":"!!!","isBase64":true}]}"#)
                .unwrap();
        let err = NamespaceBuilder::new()
            .add_manifest(manifest)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_manifest_invalid_json() {
        assert!(Manifest::from_json("{not json").unwrap_err().is_config_error());
    }

    #[test]
    fn test_manifest_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"files":[{{"path":"/secrets/db.env","content":"PASS=x"}}]}}"#).unwrap();

        let ns = NamespaceBuilder::new()
            .add_manifest_file(file.path())
            .build()
            .unwrap();
        assert!(ns.exists(r"\secrets\db.env"));
    }

    #[test]
    fn test_manifest_file_missing() {
        let err = NamespaceBuilder::new()
            .add_manifest_file("/no/such/manifest.json")
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }
}
