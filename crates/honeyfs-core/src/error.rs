//! Error types for honeyfs.
//!
//! The taxonomy is closed: every failure the namespace, the projection
//! adapter, or the control channel can produce maps to exactly one
//! [`ErrorKind`]. Callers branch on the kind, never on message text.
//!
//! # Examples
//!
//! ```
//! use honeyfs_core::{Error, ErrorKind};
//!
//! let err = Error::NotFound {
//!     path: "/Documents/passwords.xlsx".to_string(),
//! };
//!
//! assert!(err.is_not_found());
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! ```

use std::fmt;
use thiserror::Error;

/// Main error type for honeyfs.
///
/// All crates in the workspace report failures through this type so that
/// the projection adapter and the control server can translate any of them
/// into a platform error code or a protocol response.
#[derive(Error, Debug)]
pub enum Error {
    /// No node exists at the path.
    #[error("no such file or directory: {path}")]
    NotFound {
        /// Canonical (or raw, if canonicalisation failed) path
        path: String,
    },

    /// The path is malformed, or one of its ancestors is a file.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path as supplied by the caller
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Delete was requested on a directory that still has children.
    #[error("directory not empty: {path}")]
    NotEmpty {
        /// Canonical path of the directory
        path: String,
    },

    /// A control frame or request could not be decoded or dispatched.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation
        message: String,
    },

    /// The control channel is unavailable, busy, or broke mid-frame.
    #[error("transport error on '{endpoint}': {source}")]
    Transport {
        /// Endpoint the transport was bound or connected to
        endpoint: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration is missing, unreadable, or invalid.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },
}

/// Fieldless classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::InvalidPath`]
    InvalidPath,
    /// See [`Error::NotEmpty`]
    NotEmpty,
    /// See [`Error::Protocol`]
    Protocol,
    /// See [`Error::Transport`]
    Transport,
    /// See [`Error::Config`]
    Config,
}

impl ErrorKind {
    /// Returns a stable, lowercase name for the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidPath => "invalid_path",
            Self::NotEmpty => "not_empty",
            Self::Protocol => "protocol",
            Self::Transport => "transport",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Builds an [`Error::InvalidPath`].
    ///
    /// # Examples
    ///
    /// ```
    /// use honeyfs_core::Error;
    ///
    /// let err = Error::invalid_path("/a//b", "empty path segment");
    /// assert!(err.is_invalid_path());
    /// ```
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::Protocol`].
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Builds an [`Error::Transport`].
    #[must_use]
    pub fn transport(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Builds an [`Error::Config`].
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::NotEmpty { .. } => ErrorKind::NotEmpty,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns `true` if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an invalid-path error.
    #[must_use]
    pub const fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }

    /// Returns `true` if this is a directory-not-empty error.
    #[must_use]
    pub const fn is_not_empty(&self) -> bool {
        matches!(self, Self::NotEmpty { .. })
    }

    /// Returns `true` if this is a protocol error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this is a transport error.
    ///
    /// Transport errors mean "service unreachable" as opposed to
    /// "command rejected", which is reported in-band.
    ///
    /// # Examples
    ///
    /// ```
    /// use honeyfs_core::Error;
    /// use std::io;
    ///
    /// let err = Error::transport(
    ///     "honeyfs_control",
    ///     io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
    /// );
    /// assert!(err.is_transport_error());
    /// ```
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias using the honeyfs [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_kind_matches_variant() {
        let cases = [
            (
                Error::NotFound {
                    path: "/x".to_string(),
                },
                ErrorKind::NotFound,
            ),
            (Error::invalid_path("a//b", "empty"), ErrorKind::InvalidPath),
            (
                Error::NotEmpty {
                    path: "/d".to_string(),
                },
                ErrorKind::NotEmpty,
            ),
            (Error::protocol("bad frame"), ErrorKind::Protocol),
            (
                Error::transport("pipe", io::Error::other("gone")),
                ErrorKind::Transport,
            ),
            (Error::config("bad level"), ErrorKind::Config),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_classifiers_are_exclusive() {
        let err = Error::NotEmpty {
            path: "/d".to_string(),
        };
        assert!(err.is_not_empty());
        assert!(!err.is_not_found());
        assert!(!err.is_invalid_path());
        assert!(!err.is_protocol_error());
        assert!(!err.is_transport_error());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::invalid_path("/a/../b", "parent reference");
        let msg = err.to_string();
        assert!(msg.contains("/a/../b"));
        assert!(msg.contains("parent reference"));
    }

    #[test]
    fn test_transport_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::transport(
            "honeyfs_control",
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("honeyfs_control"));
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ErrorKind::NotEmpty.as_str(), "not_empty");
        assert_eq!(ErrorKind::Transport.to_string(), "transport");
    }
}
