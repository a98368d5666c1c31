//! Control channel endpoints.
//!
//! A well-known channel name maps to a platform address:
//!
//! - Unix: a domain socket `<runtime dir>/<name>.sock` (falling back to the
//!   temp dir when there is no runtime dir). A name containing `/` is used
//!   as the socket path directly.
//! - Windows: the named pipe `\\.\pipe\<name>`. A name already starting
//!   with `\\` is used as is.

use honeyfs_core::{Error, Result};
use std::fmt;
use std::io;

#[cfg(unix)]
use std::path::PathBuf;

/// Resolved address of the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: String,
}

impl Endpoint {
    /// Resolves a well-known channel name to its platform address.
    #[must_use]
    pub fn resolve(name: &str) -> Self {
        Self {
            address: platform_address(name),
        }
    }

    /// Uses `address` verbatim.
    #[must_use]
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// The platform address (socket path or pipe name).
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Wraps an I/O error as a transport error on this endpoint.
    #[must_use]
    pub fn transport_error(&self, source: io::Error) -> Error {
        Error::transport(self.address.clone(), source)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[cfg(unix)]
fn platform_address(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    dir.join(format!("{name}.sock")).to_string_lossy().into_owned()
}

#[cfg(windows)]
fn platform_address(name: &str) -> String {
    if name.starts_with(r"\\") {
        name.to_string()
    } else {
        format!(r"\\.\pipe\{name}")
    }
}

#[cfg(unix)]
pub(crate) use unix::{ClientConnection, Listener, ServerConnection, connect};

#[cfg(windows)]
pub(crate) use windows::{ClientConnection, Listener, ServerConnection, connect};

#[cfg(unix)]
mod unix {
    use super::{Endpoint, PathBuf, Result};
    use std::io;
    use std::os::unix::fs::FileTypeExt;
    use tokio::net::{UnixListener, UnixStream};
    use tracing::{debug, warn};

    pub type ServerConnection = UnixStream;
    pub type ClientConnection = UnixStream;

    /// Bound domain socket; the socket file is removed on drop.
    #[derive(Debug)]
    pub struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        /// Binds the socket. A leftover socket nobody listens on is
        /// replaced; any other existing file is left alone and refused.
        pub fn bind(endpoint: &Endpoint) -> Result<Self> {
            let path = PathBuf::from(endpoint.address());

            match std::fs::symlink_metadata(&path) {
                Ok(meta) if !meta.file_type().is_socket() => {
                    return Err(endpoint.transport_error(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "path exists and is not a socket",
                    )));
                }
                Ok(_) => {
                    if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                        return Err(endpoint.transport_error(io::Error::new(
                            io::ErrorKind::AddrInUse,
                            "another server is listening",
                        )));
                    }
                    debug!(path = %path.display(), "removing stale socket");
                    std::fs::remove_file(&path).map_err(|e| endpoint.transport_error(e))?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(endpoint.transport_error(e)),
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| endpoint.transport_error(e))?;
            }

            let inner = UnixListener::bind(&path).map_err(|e| endpoint.transport_error(e))?;
            Ok(Self { inner, path })
        }

        #[allow(clippy::needless_pass_by_ref_mut)] // matches the named pipe listener
        pub async fn accept(&mut self) -> io::Result<ServerConnection> {
            let (stream, _) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "failed to remove socket");
                }
            }
        }
    }

    pub async fn connect(endpoint: &Endpoint) -> io::Result<ClientConnection> {
        UnixStream::connect(endpoint.address()).await
    }
}

#[cfg(windows)]
mod windows {
    use super::{Endpoint, Result};
    use std::io;
    use std::time::Duration;
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    const ERROR_PIPE_BUSY: i32 = 231;
    const PIPE_BUSY_POLL: Duration = Duration::from_millis(50);

    pub type ServerConnection = NamedPipeServer;
    pub type ClientConnection = NamedPipeClient;

    /// The next pipe instance waiting for a client.
    #[derive(Debug)]
    pub struct Listener {
        next: NamedPipeServer,
        name: String,
    }

    impl Listener {
        pub fn bind(endpoint: &Endpoint) -> Result<Self> {
            let name = endpoint.address().to_string();
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(&name)
                .map_err(|e| endpoint.transport_error(e))?;
            Ok(Self { next, name })
        }

        pub async fn accept(&mut self) -> io::Result<ServerConnection> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }
    }

    /// Waits while every pipe instance is busy; the caller bounds the wait.
    pub async fn connect(endpoint: &Endpoint) -> io::Result<ClientConnection> {
        loop {
            match ClientOptions::new().open(endpoint.address()) {
                Ok(client) => return Ok(client),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(PIPE_BUSY_POLL).await;
        }
    }
}
