//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr. When an access log directory is configured,
//! access and alert events are also written as JSON lines to a daily
//! rolling file.

use anyhow::{Context, Result};
use honeyfs_projection::{ACCESS_TARGET, ALERT_TARGET};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix of the rolling access log.
pub const ACCESS_LOG_PREFIX: &str = "access.log";

/// Filter for the rolling access log: access records and alerts only.
#[must_use]
pub fn access_targets() -> Targets {
    Targets::new()
        .with_target(ACCESS_TARGET, LevelFilter::INFO)
        .with_target(ALERT_TARGET, LevelFilter::WARN)
}

/// Initializes the global subscriber.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` wins over the
/// configured `level`. The returned guard flushes the access log and must
/// be held until exit.
///
/// # Errors
///
/// Returns an error if the access log directory cannot be created or a
/// global subscriber is already installed.
pub fn init(
    verbose: bool,
    level: &str,
    access_log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let (access, guard) = match access_log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create access log directory {}", dir.display())
            })?;
            let appender = tracing_appender::rolling::daily(dir, ACCESS_LOG_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(access_targets());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(access)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_access_targets_admit_only_access_and_alerts() {
        let targets = access_targets();
        assert!(targets.would_enable(ACCESS_TARGET, &Level::INFO));
        assert!(targets.would_enable(ALERT_TARGET, &Level::WARN));
        assert!(!targets.would_enable(ALERT_TARGET, &Level::INFO));
        assert!(!targets.would_enable("honeyfs_control::server", &Level::ERROR));
    }
}
