//! The control protocol server.
//!
//! One client is served at a time. Each connection runs on its own task and
//! loops `receive frame -> dispatch -> send frame` until the client hangs
//! up, so a slow controller never blocks filesystem callers, which only
//! contend for the namespace lock.
//!
//! What happens to a second client depends on [`BusyPolicy`]:
//!
//! - `Queue`: the server does not accept it until the active client leaves;
//!   it waits in the listen backlog.
//! - `Refuse`: it is accepted, its first request is answered with a busy
//!   failure, and it is closed.

use crate::codec::{decode_json, encode_json, frame_codec};
use crate::endpoint::{Endpoint, Listener, ServerConnection};
use crate::protocol::{Request, Response, dispatch};
use futures::{SinkExt, StreamExt};
use honeyfs_core::config::ControlConfig;
use honeyfs_core::{BusyPolicy, Error, Result};
use honeyfs_namespace::Namespace;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// How long a refused client gets to send its request before it is closed.
const BUSY_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Where to listen
    pub endpoint: Endpoint,
    /// Largest accepted frame payload
    pub max_frame_bytes: usize,
    /// Second-connection behaviour
    pub busy_policy: BusyPolicy,
}

impl ServerConfig {
    /// Builds server settings from the `[control]` configuration section.
    #[must_use]
    pub fn from_config(control: &ControlConfig) -> Self {
        Self {
            endpoint: Endpoint::resolve(&control.endpoint),
            max_frame_bytes: control.max_frame_bytes,
            busy_policy: control.busy_policy,
        }
    }
}

/// A bound control server.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use honeyfs_core::config::ControlConfig;
/// use honeyfs_control::{ControlServer, ServerConfig};
/// use honeyfs_namespace::Namespace;
/// use tokio::sync::watch;
///
/// # async fn example() -> honeyfs_core::Result<()> {
/// let namespace = Arc::new(Namespace::new());
/// let config = ServerConfig::from_config(&ControlConfig::default());
/// let server = ControlServer::bind(namespace, config)?;
///
/// let (stop, shutdown) = watch::channel(false);
/// let task = tokio::spawn(server.run(shutdown));
/// // ...
/// stop.send(true).ok();
/// task.await.ok();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControlServer {
    namespace: Arc<Namespace>,
    config: ServerConfig,
    listener: Listener,
}

impl ControlServer {
    /// Binds the endpoint. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the endpoint cannot be bound or
    /// another server already owns it.
    pub fn bind(namespace: Arc<Namespace>, config: ServerConfig) -> Result<Self> {
        let listener = Listener::bind(&config.endpoint)?;
        info!(
            endpoint = %config.endpoint,
            policy = ?config.busy_policy,
            "control server listening"
        );
        Ok(Self {
            namespace,
            config,
            listener,
        })
    }

    /// The bound endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Serves clients until `shutdown` turns `true` or its sender is
    /// dropped. In-flight connections are aborted and the endpoint is
    /// released on return.
    ///
    /// # Errors
    ///
    /// Currently never fails; accept errors are logged and retried.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let slots = Arc::new(Semaphore::new(1));
        let mut connections = JoinSet::new();

        loop {
            while connections.try_join_next().is_some() {}

            let permit = match self.config.busy_policy {
                BusyPolicy::Queue => tokio::select! {
                    () = shutdown_requested(&mut shutdown) => break,
                    permit = Arc::clone(&slots).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                BusyPolicy::Refuse => None,
            };

            let accepted = tokio::select! {
                () = shutdown_requested(&mut shutdown) => break,
                accepted = self.listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let permit = permit.or_else(|| Arc::clone(&slots).try_acquire_owned().ok());
            let namespace = Arc::clone(&self.namespace);
            let endpoint = self.config.endpoint.clone();
            let max_frame_bytes = self.config.max_frame_bytes;

            match permit {
                Some(permit) => {
                    connections.spawn(async move {
                        let _permit = permit;
                        handle_client(stream, &namespace, &endpoint, max_frame_bytes).await;
                    });
                }
                None => {
                    connections.spawn(refuse_busy(stream, max_frame_bytes));
                }
            }
        }

        connections.abort_all();
        info!(endpoint = %self.config.endpoint, "control server stopped");
        Ok(())
    }
}

/// Resolves once shutdown is signalled or the signal sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // An Err means the sender was dropped, which also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn handle_client(
    stream: ServerConnection,
    namespace: &Namespace,
    endpoint: &Endpoint,
    max_frame_bytes: usize,
) {
    info!("control client connected");
    match serve_connection(stream, namespace, max_frame_bytes, endpoint).await {
        Ok(()) => info!("control client disconnected"),
        Err(e) => warn!(error = %e, "control connection closed"),
    }
}

async fn refuse_busy(stream: ServerConnection, max_frame_bytes: usize) {
    warn!("refusing control client: another client is connected");
    let mut framed = Framed::new(stream, frame_codec(max_frame_bytes));
    if tokio::time::timeout(BUSY_READ_TIMEOUT, framed.next()).await.is_err() {
        debug!("refused client sent nothing");
    }
    if let Ok(payload) = encode_json(&Response::busy()) {
        if let Err(e) = framed.send(payload).await {
            debug!(error = %e, "failed to send busy response");
        }
    }
}

/// Serves one connection until the peer disconnects.
///
/// Malformed JSON and rejected commands are answered in-band and the loop
/// continues. A frame over `max_frame_bytes` is answered with a failure and
/// ends the connection, since the stream cannot be resynchronised.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for an oversized frame and
/// [`Error::Transport`] if the stream breaks.
pub async fn serve_connection<S>(
    stream: S,
    namespace: &Namespace,
    max_frame_bytes: usize,
    endpoint: &Endpoint,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, frame_codec(max_frame_bytes));

    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                let err = Error::protocol(format!("frame rejected: {e}"));
                if let Ok(payload) = encode_json(&Response::failure(err.to_string())) {
                    // Best effort: the peer may already be gone.
                    let _ = framed.send(payload).await;
                }
                return Err(err);
            }
            Err(e) => return Err(endpoint.transport_error(e)),
        };

        let response = match decode_json::<Request>(&frame) {
            Ok(request) => {
                debug!(action = %request.action, path = ?request.path, "control request");
                dispatch(namespace, &request)
            }
            Err(e) => {
                warn!(error = %e, "malformed control request");
                Response::from(e)
            }
        };

        framed
            .send(encode_json(&response)?)
            .await
            .map_err(|e| endpoint.transport_error(e))?;
    }

    Ok(())
}
