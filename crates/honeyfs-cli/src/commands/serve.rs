//! The `serve` command: run the decoy service until interrupted.
//!
//! A [`Service`] owns the shared namespace, the projection adapter handed
//! to the platform file system hook, and the bound control server. With
//! the `fuse` feature and a configured mountpoint the adapter is also
//! mounted into the host file system for as long as the service runs.

use anyhow::{Context, Result};
use honeyfs_control::{ControlServer, Endpoint, ServerConfig};
use honeyfs_core::ServiceConfig;
use honeyfs_core::cli::ExitCode;
use crate::cli::ServeArgs;
use honeyfs_core::config::{AccessConfig, MountConfig, NamespaceConfig};
use honeyfs_namespace::{Namespace, NamespaceBuilder};
use honeyfs_projection::{AccessLogger, AlertObserver, ProjectionAdapter, ThrottledObserver};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[cfg(feature = "fuse")]
type Mounted = honeyfs_projection::fuse::FuseMount;
#[cfg(not(feature = "fuse"))]
type Mounted = std::convert::Infallible;

/// Applies `serve` flags on top of the loaded configuration.
pub fn apply_overrides(config: &mut ServiceConfig, args: ServeArgs) {
    if let Some(endpoint) = args.endpoint {
        config.control.endpoint = endpoint;
    }
    if let Some(manifest) = args.manifest {
        config.namespace.manifest = Some(manifest);
    }
    if let Some(mountpoint) = args.mountpoint {
        config.mount.mountpoint = Some(mountpoint);
    }
}

/// Builds the startup namespace from the manifest, if any.
///
/// # Errors
///
/// Returns the first manifest or path error.
pub fn build_namespace(config: &NamespaceConfig) -> honeyfs_core::Result<Namespace> {
    let mut builder = NamespaceBuilder::with_retention(config.write_retention)
        .with_max_file_bytes(config.max_file_bytes);
    if let Some(manifest) = &config.manifest {
        builder = builder.add_manifest_file(manifest);
    }
    builder.build()
}

/// Access logger with the throttled open alert installed.
#[must_use]
pub fn access_logger(config: &AccessConfig) -> AccessLogger {
    AccessLogger::new().with_observer(Arc::new(ThrottledObserver::new(
        AlertObserver,
        config.alert_throttle(),
    )))
}

#[cfg(feature = "fuse")]
fn mount(adapter: &Arc<ProjectionAdapter>, config: &MountConfig) -> Result<Option<Mounted>> {
    let Some(dir) = &config.mountpoint else {
        return Ok(None);
    };
    let mounted = honeyfs_projection::fuse::spawn_mount(Arc::clone(adapter), dir)
        .with_context(|| format!("failed to mount on {}", dir.display()))?;
    Ok(Some(mounted))
}

#[cfg(not(feature = "fuse"))]
fn mount(_adapter: &Arc<ProjectionAdapter>, config: &MountConfig) -> Result<Option<Mounted>> {
    match &config.mountpoint {
        None => Ok(None),
        Some(dir) => Err(honeyfs_core::Error::config(format!(
            "cannot mount on {}: built without fuse support (rebuild with --features fuse)",
            dir.display()
        ))
        .into()),
    }
}

/// A running decoy service.
#[derive(Debug)]
pub struct Service {
    namespace: Arc<Namespace>,
    adapter: Arc<ProjectionAdapter>,
    server: ControlServer,
    mount: Option<Mounted>,
}

impl Service {
    /// Loads the namespace and binds the control endpoint. Must be called
    /// inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded, the endpoint
    /// cannot be bound or the mount fails.
    pub fn start(config: &ServiceConfig) -> Result<Self> {
        let namespace = build_namespace(&config.namespace).context("failed to load namespace")?;
        let namespace = Arc::new(namespace);
        let adapter = Arc::new(ProjectionAdapter::new(
            Arc::clone(&namespace),
            access_logger(&config.access),
        ));
        let server_config = ServerConfig::from_config(&config.control);
        let server = ControlServer::bind(Arc::clone(&namespace), server_config)
            .context("failed to start control server")?;
        let mount = mount(&adapter, &config.mount)?;

        info!(
            nodes = namespace.len(),
            endpoint = %server.endpoint(),
            retention = ?namespace.retention(),
            mounted = mount.is_some(),
            "service started"
        );
        Ok(Self {
            namespace,
            adapter,
            server,
            mount,
        })
    }

    /// The shared namespace.
    #[must_use]
    pub const fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// The projection adapter for the platform file system hook.
    #[must_use]
    pub fn adapter(&self) -> Arc<ProjectionAdapter> {
        Arc::clone(&self.adapter)
    }

    /// The bound control endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        self.server.endpoint()
    }

    /// Serves until `signal` resolves, then stops the control server and
    /// waits for it to release the endpoint. The mount, if any, is
    /// released last.
    ///
    /// # Errors
    ///
    /// Returns an error if the control server task fails.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            namespace: _,
            adapter,
            server,
            mount,
        } = self;
        let (stop, shutdown) = watch::channel(false);
        let mut task = tokio::spawn(server.run(shutdown));

        tokio::select! {
            () = signal => {
                info!("shutdown requested");
                let _ = stop.send(true);
            }
            result = &mut task => {
                result.context("control server task panicked")??;
                return Ok(());
            }
        }

        task.await.context("control server task panicked")??;
        drop(mount);
        info!(open_handles = adapter.open_handles(), "service stopped");
        Ok(())
    }
}

/// Runs the service until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the service fails to start or stops abnormally.
pub async fn run(config: &ServiceConfig) -> Result<ExitCode> {
    let service = Service::start(config)?;
    service
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeyfs_core::WriteRetention;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_apply_overrides() {
        let mut config = ServiceConfig::default();
        let args = ServeArgs {
            endpoint: Some("/tmp/x.sock".into()),
            ..ServeArgs::default()
        };
        apply_overrides(&mut config, args);
        assert_eq!(config.control.endpoint, "/tmp/x.sock");
        assert_eq!(config.namespace.manifest, None);

        let args = ServeArgs {
            manifest: Some(PathBuf::from("/etc/decoys.json")),
            mountpoint: Some(PathBuf::from("/srv/share")),
            ..ServeArgs::default()
        };
        apply_overrides(&mut config, args);
        assert_eq!(config.control.endpoint, "/tmp/x.sock");
        let manifest = config.namespace.manifest.as_deref();
        assert_eq!(manifest, Some(PathBuf::from("/etc/decoys.json").as_path()));
        let mountpoint = config.mount.mountpoint.as_deref();
        assert_eq!(mountpoint, Some(PathBuf::from("/srv/share").as_path()));
    }

    #[test]
    fn test_build_namespace_without_manifest() {
        let namespace = build_namespace(&NamespaceConfig::default()).unwrap();
        assert!(namespace.exists("/"));
        assert_eq!(namespace.retention(), WriteRetention::Discard);
    }

    #[test]
    fn test_build_namespace_from_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"files": [{{"path": "/keys/id_rsa", "content": "-----BEGIN"}}]}}"#
        )
        .unwrap();

        let namespace = build_namespace(&NamespaceConfig {
            manifest: Some(file.path().to_path_buf()),
            write_retention: WriteRetention::Retain,
            max_file_bytes: 1024,
        })
        .unwrap();
        assert_eq!(namespace.read("/keys/id_rsa", 0, 64).unwrap(), b"-----BEGIN");
        assert_eq!(namespace.retention(), WriteRetention::Retain);
        assert_eq!(namespace.max_file_bytes(), 1024);
    }

    #[test]
    fn test_build_namespace_missing_manifest() {
        let err = build_namespace(&NamespaceConfig {
            manifest: Some(PathBuf::from("/nonexistent/decoys.json")),
            ..NamespaceConfig::default()
        })
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_access_logger_installs_alert() {
        assert_eq!(access_logger(&AccessConfig::default()).observer_count(), 1);
    }

    #[tokio::test]
    async fn test_start_without_mountpoint_is_not_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.control.endpoint = dir.path().join("ctl.sock").to_string_lossy().into_owned();

        let service = Service::start(&config).unwrap();
        assert!(service.mount.is_none());
    }

    #[cfg(not(feature = "fuse"))]
    #[tokio::test]
    async fn test_start_with_mountpoint_needs_fuse_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.control.endpoint = dir.path().join("ctl.sock").to_string_lossy().into_owned();
        config.mount.mountpoint = Some(dir.path().to_path_buf());

        let err = Service::start(&config).unwrap_err();
        let core = err.downcast_ref::<honeyfs_core::Error>().unwrap();
        assert!(core.is_config_error());
        assert!(err.to_string().contains("--features fuse"));
    }
}
