//! Access logging.
//!
//! Every recorded access becomes one `tracing` event on the
//! [`ACCESS_TARGET`] target carrying a timestamp, the operation and the
//! path, and is then handed to each registered [`AccessObserver`].
//! Recording never fails and never changes what the calling filesystem
//! operation returns: observer errors are logged at debug level and dropped,
//! and a panicking observer is caught and logged at warn level.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracing target of access records.
pub const ACCESS_TARGET: &str = "honeyfs::access";

/// Error type observers may return. It is never propagated.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Filesystem operation being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessOp {
    /// A file or directory was opened
    Open,
    /// The first chunk of a file was read
    Read,
    /// A file was created through the projection
    Create,
    /// Bytes were written through the projection
    Write,
}

impl AccessOp {
    /// Upper-case operation name as it appears in access records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Read => "READ",
            Self::Create => "CREATE",
            Self::Write => "WRITE",
        }
    }
}

impl fmt::Display for AccessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEvent {
    /// When the access happened
    pub timestamp: DateTime<Utc>,
    /// What was done
    pub op: AccessOp,
    /// Canonical path, or the raw path if it could not be canonicalised
    pub path: String,
}

impl AccessEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(op: AccessOp, path: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            op,
            path: path.into(),
        }
    }
}

/// Receives every access the logger records.
///
/// Implementations run on the filesystem call path and must return quickly.
/// This is the hook for side-channel alerting (DNS canaries, webhooks).
/// A panic inside [`on_access`](Self::on_access) is caught by
/// [`AccessLogger`] and does not reach the filesystem caller.
pub trait AccessObserver: Send + Sync {
    /// Handles one access event.
    ///
    /// # Errors
    ///
    /// Any error is swallowed by [`AccessLogger`].
    fn on_access(&self, event: &AccessEvent) -> Result<(), ObserverError>;

    /// Whether this observer acts on `op` at all. Wrappers such as
    /// [`ThrottledObserver`](crate::ThrottledObserver) skip events for which
    /// this returns `false`.
    fn handles(&self, _op: AccessOp) -> bool {
        true
    }
}

/// Emits access records and fans them out to observers.
#[derive(Clone, Default)]
pub struct AccessLogger {
    observers: Vec<Arc<dyn AccessObserver>>,
}

impl AccessLogger {
    /// Creates a logger with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AccessObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Records one access.
    pub fn record(&self, op: AccessOp, path: &str) {
        self.emit(&AccessEvent::now(op, path));
    }

    /// Records a prepared event.
    pub fn emit(&self, event: &AccessEvent) {
        info!(
            target: ACCESS_TARGET,
            timestamp = %event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            op = %event.op,
            path = %event.path,
            "access"
        );

        for observer in &self.observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.on_access(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, path = %event.path, "access observer failed"),
                Err(_) => warn!(op = %event.op, path = %event.path, "access observer panicked"),
            }
        }
    }
}

impl fmt::Debug for AccessLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogger")
            .field("observers", &self.observers.len())
            .finish()
    }
}
