//! Canonical virtual paths.
//!
//! Callers address the namespace with either separator convention, with or
//! without a leading separator: `\Documents\x`, `/Documents/x` and
//! `Documents/x` all name the same node. [`NodePath`] is the single place
//! where that canonicalisation happens, and every namespace entry point goes
//! through it.
//!
//! The canonical form is:
//! - forward slashes only
//! - exactly one leading `/`
//! - no trailing `/` (except the root itself)
//! - no empty, `.` or `..` segments
//!
//! # Examples
//!
//! ```
//! use honeyfs_core::NodePath;
//!
//! let a = NodePath::new(r"\Documents\x").unwrap();
//! let b = NodePath::new("/Documents/x").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "/Documents/x");
//! ```

use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Canonicalises a raw path string.
///
/// Backslashes are treated as separators, any run of leading separators and
/// any trailing separators are dropped, and an empty remainder is the root.
/// The operation is idempotent.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if the path contains a NUL byte, an empty
/// segment (`a//b`), or a `.`/`..` segment.
///
/// # Examples
///
/// ```
/// use honeyfs_core::path::normalize;
///
/// assert_eq!(normalize(r"\a\b").unwrap(), "/a/b");
/// assert_eq!(normalize(r"\\TestMCP").unwrap(), "/TestMCP");
/// assert_eq!(normalize("").unwrap(), "/");
/// assert!(normalize("/a//b").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String> {
    if raw.contains('\0') {
        return Err(Error::invalid_path(raw, "path contains a NUL byte"));
    }

    let unified = raw.replace('\\', "/");
    let trimmed = unified.trim_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }

    let mut canonical = String::with_capacity(trimmed.len() + 1);
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(Error::invalid_path(raw, "empty path segment")),
            "." | ".." => {
                return Err(Error::invalid_path(
                    raw,
                    format!("relative segment '{segment}' is not allowed"),
                ));
            }
            _ => {
                canonical.push('/');
                canonical.push_str(segment);
            }
        }
    }

    Ok(canonical)
}

/// A canonical, absolute path inside the virtual namespace.
///
/// Ordering is plain byte ordering of the canonical string, so all
/// descendants of a directory `d` sort contiguously after `d/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    /// Canonicalises `raw` into a `NodePath`.
    ///
    /// # Errors
    ///
    /// See [`normalize`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        normalize(raw.as_ref()).map(Self)
    }

    /// The root directory `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the parent directory, or `None` for the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use honeyfs_core::NodePath;
    ///
    /// let p = NodePath::new("/a/b/c.txt").unwrap();
    /// assert_eq!(p.parent().unwrap().as_str(), "/a/b");
    /// assert_eq!(NodePath::new("/a").unwrap().parent(), Some(NodePath::root()));
    /// assert_eq!(NodePath::root().parent(), None);
    /// ```
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
        }
    }

    /// Returns the last segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Appends one or more segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `name` is not a valid relative path.
    pub fn join(&self, name: &str) -> Result<Self> {
        let joined = if self.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.0)
        };
        Self::new(joined)
    }

    /// Returns every proper ancestor below the root, outermost first.
    ///
    /// # Examples
    ///
    /// ```
    /// use honeyfs_core::NodePath;
    ///
    /// let p = NodePath::new("/a/b/c.txt").unwrap();
    /// let names: Vec<_> = p.ancestors().iter().map(|a| a.as_str().to_string()).collect();
    /// assert_eq!(names, vec!["/a", "/a/b"]);
    /// ```
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            current = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Prefix shared by every descendant of this path (`/a/` for `/a`, `/`
    /// for the root).
    #[must_use]
    pub fn child_prefix(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("{}/", self.0)
        }
    }

    /// If `self` is a direct child of `dir`, returns its name.
    #[must_use]
    pub fn name_under(&self, dir: &Self) -> Option<&str> {
        let rest = self.0.strip_prefix(&dir.child_prefix())?;
        (!rest.is_empty() && !rest.contains('/')).then_some(rest)
    }

    /// Consumes the path and returns the canonical string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets ordered maps keyed by `NodePath` be range-queried by string prefix.
impl Borrow<str> for NodePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NodePath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for NodePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
