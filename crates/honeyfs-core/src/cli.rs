//! CLI value types shared by the `honeyfs` binary and its tests.
//!
//! # Examples
//!
//! ```
//! use honeyfs_core::cli::{ExitCode, OutputFormat};
//!
//! let format: OutputFormat = "json".parse().unwrap();
//! assert_eq!(format, OutputFormat::Json);
//! assert_eq!(ExitCode::TRANSPORT.as_i32(), 3);
//! ```

use crate::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// JSON for machine parsing
    Json,
    /// Compact single-line output for scripts
    Text,
    /// Colored output for humans
    #[default]
    Pretty,
}

impl OutputFormat {
    /// Returns the string representation of the format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "pretty" => Ok(Self::Pretty),
            _ => Err(Error::config(format!(
                "invalid output format: '{s}' (expected: json, text, or pretty)"
            ))),
        }
    }
}

/// Process exit code.
///
/// `ctl` callers tell a rejected command (1) apart from an unreachable
/// service (3) by exit code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success (0).
    pub const SUCCESS: Self = Self(0);

    /// The service answered `success: false` (1).
    pub const REJECTED: Self = Self(1);

    /// Bad arguments, paths or configuration (2).
    pub const INVALID_INPUT: Self = Self(2);

    /// The control channel could not be reached (3).
    pub const TRANSPORT: Self = Self(3);

    /// Creates an exit code from an integer value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }

    /// Returns the exit code as an integer.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Checks if the exit code represents success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Exit code for a failed operation.
    #[must_use]
    pub const fn for_error(error: &Error) -> Self {
        match error.kind() {
            ErrorKind::Transport => Self::TRANSPORT,
            ErrorKind::InvalidPath | ErrorKind::Config => Self::INVALID_INPUT,
            ErrorKind::NotFound | ErrorKind::NotEmpty | ErrorKind::Protocol => Self::REJECTED,
        }
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
