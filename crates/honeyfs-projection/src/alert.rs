//! Alerting observers.
//!
//! [`AlertObserver`] raises a warning whenever a decoy is opened.
//! [`ThrottledObserver`] wraps any observer and drops repeat events for the
//! same operation on the same path inside a suppression window, so a single
//! `cp -r` over the tree does not produce one alert per chunk or per retry.

use crate::access::{AccessEvent, AccessObserver, AccessOp, ObserverError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::warn;

/// Tracing target of alerts.
pub const ALERT_TARGET: &str = "honeyfs::alert";

/// Default per-path suppression window.
pub const DEFAULT_ALERT_WINDOW: Duration = Duration::from_secs(5);

/// Emits a `warn` event on [`ALERT_TARGET`] for every open.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertObserver;

impl AccessObserver for AlertObserver {
    fn on_access(&self, event: &AccessEvent) -> Result<(), ObserverError> {
        if self.handles(event.op) {
            warn!(
                target: ALERT_TARGET,
                path = %event.path,
                timestamp = %event.timestamp.to_rfc3339(),
                "decoy opened"
            );
        }
        Ok(())
    }

    fn handles(&self, op: AccessOp) -> bool {
        op == AccessOp::Open
    }
}

/// Forwards an event to the inner observer at most once per operation and
/// path per window. Operations the inner observer does not handle are
/// dropped without touching the window.
pub struct ThrottledObserver<O> {
    inner: O,
    window: Duration,
    last_seen: Mutex<HashMap<(AccessOp, String), Instant>>,
}

impl<O: AccessObserver> ThrottledObserver<O> {
    /// Wraps `inner` with a suppression window.
    #[must_use]
    pub fn new(inner: O, window: Duration) -> Self {
        Self {
            inner,
            window,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// The suppression window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Decides whether `op` on `path` at `now` passes, recording it if so.
    fn admit(&self, op: AccessOp, path: &str, now: Instant) -> bool {
        let mut last_seen = self.last_seen.lock();
        let key = (op, path.to_string());
        let admitted = last_seen
            .get(&key)
            .is_none_or(|prev| now.saturating_duration_since(*prev) >= self.window);
        if admitted {
            last_seen.insert(key, now);
        }
        admitted
    }
}

impl<O: AccessObserver> AccessObserver for ThrottledObserver<O> {
    fn on_access(&self, event: &AccessEvent) -> Result<(), ObserverError> {
        if self.handles(event.op) && self.admit(event.op, &event.path, Instant::now()) {
            self.inner.on_access(event)
        } else {
            Ok(())
        }
    }

    fn handles(&self, op: AccessOp) -> bool {
        self.inner.handles(op)
    }
}

impl<O> fmt::Debug for ThrottledObserver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledObserver")
            .field("window", &self.window)
            .field("tracked", &self.last_seen.lock().len())
            .finish_non_exhaustive()
    }
}
