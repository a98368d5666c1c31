//! Control protocol messages and the dispatch table.
//!
//! A request names an action and a path:
//!
//! ```json
//! {"action": "create_file", "path": "\\TestMCP\\a.txt", "content": "aGk=", "isBase64": true}
//! ```
//!
//! and is answered with
//!
//! ```json
//! {"success": true}
//! {"success": true, "data": ["a.txt"]}
//! {"success": false, "message": "no such file or directory: /nonexistent"}
//! ```
//!
//! `message` is present only on failure and `data` only on a successful
//! listing. Rejections are always answered in-band; nothing here closes the
//! connection.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use honeyfs_core::{Error, ListFilter, Result};
use honeyfs_namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Message sent to a client that connects while another is being served.
pub const BUSY_MESSAGE: &str = "control channel busy: another client is connected";

/// A control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create or overwrite a file
    CreateFile,
    /// Create a directory (idempotent)
    CreateDirectory,
    /// Delete a file or empty directory
    DeleteFile,
    /// List file children
    ListFiles,
    /// List directory children
    ListDirectories,
    /// List all children
    ListAll,
}

impl Action {
    /// Every action, in wire-name order.
    pub const ALL: [Self; 6] = [
        Self::CreateFile,
        Self::CreateDirectory,
        Self::DeleteFile,
        Self::ListFiles,
        Self::ListDirectories,
        Self::ListAll,
    ];

    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateFile => "create_file",
            Self::CreateDirectory => "create_directory",
            Self::DeleteFile => "delete_file",
            Self::ListFiles => "list_files",
            Self::ListDirectories => "list_directories",
            Self::ListAll => "list_all",
        }
    }

    /// Listing filter for list actions, `None` for mutations.
    #[must_use]
    pub const fn list_filter(self) -> Option<ListFilter> {
        match self {
            Self::ListFiles => Some(ListFilter::Files),
            Self::ListDirectories => Some(ListFilter::Directories),
            Self::ListAll => Some(ListFilter::All),
            Self::CreateFile | Self::CreateDirectory | Self::DeleteFile => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|a| a.as_str()).collect();
                Error::protocol(format!(
                    "unknown action '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// A control request.
///
/// The action is kept as a string so that unknown actions reach the
/// dispatcher and are rejected in-band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Action wire name
    pub action: String,

    /// Target path in either separator convention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// File body for `create_file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// `content` is base64 rather than UTF-8 text
    #[serde(default, rename = "isBase64")]
    pub is_base64: bool,
}

impl Request {
    /// Creates a request for `action` on `path`.
    #[must_use]
    pub fn new(action: Action, path: impl Into<String>) -> Self {
        Self {
            action: action.as_str().to_string(),
            path: Some(path.into()),
            content: None,
            is_base64: false,
        }
    }

    /// A `create_file` request. Content that is not valid UTF-8 is sent as
    /// base64.
    #[must_use]
    pub fn create_file(path: impl Into<String>, content: &[u8]) -> Self {
        let (content, is_base64) = match std::str::from_utf8(content) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (STANDARD.encode(content), true),
        };
        Self {
            content: Some(content),
            is_base64,
            ..Self::new(Action::CreateFile, path)
        }
    }

    /// Decoded file body; absent content is an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `isBase64` is set and the content is
    /// not valid base64.
    pub fn decoded_content(&self) -> Result<Vec<u8>> {
        let Some(content) = self.content.as_deref() else {
            return Ok(Vec::new());
        };
        if self.is_base64 {
            STANDARD
                .decode(content)
                .map_err(|e| Error::protocol(format!("invalid base64 content: {e}")))
        } else {
            Ok(content.as_bytes().to_vec())
        }
    }
}

/// A control response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the command was applied
    pub success: bool,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Listing payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
}

impl Response {
    /// A bare success.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }

    /// A success carrying a listing.
    #[must_use]
    pub const fn listing(names: Vec<String>) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(names),
        }
    }

    /// A failure with a description.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// The answer sent to a refused second client.
    #[must_use]
    pub fn busy() -> Self {
        Self::failure(BUSY_MESSAGE)
    }

    /// Returns `true` for the busy answer.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.success && self.message.as_deref() == Some(BUSY_MESSAGE)
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::failure(err.to_string())
    }
}

/// Applies one request to the namespace and builds its response.
///
/// Never fails: every rejection becomes a `success: false` response.
#[must_use]
pub fn dispatch(namespace: &Namespace, request: &Request) -> Response {
    match apply(namespace, request) {
        Ok(response) => response,
        Err(e) => {
            debug!(action = %request.action, error = %e, "request rejected");
            Response::from(e)
        }
    }
}

fn apply(namespace: &Namespace, request: &Request) -> Result<Response> {
    let action: Action = request.action.parse()?;
    let path = request
        .path
        .as_deref()
        .ok_or_else(|| Error::protocol(format!("'{action}' requires a path")))?;

    if let Some(filter) = action.list_filter() {
        return namespace.list_children(path, filter).map(Response::listing);
    }

    if action == Action::CreateFile {
        namespace.create_file(path, request.decoded_content()?)?;
    } else if action == Action::CreateDirectory {
        namespace.create_directory(path)?;
    } else {
        namespace.delete(path)?;
    }
    Ok(Response::ok())
}
