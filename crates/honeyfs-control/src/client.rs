//! The control protocol client.
//!
//! [`ControlClient::send_command`] returns `Ok(response)` whenever the
//! server answered, including `success: false` rejections, and
//! [`Error::Transport`] when it could not be reached. Callers therefore
//! tell "service unreachable" apart from "command rejected" by the `Result`
//! alone.
//!
//! Connecting is lazy and retried under a [`RetryPolicy`]. A busy answer
//! from a server running with the refuse policy counts as a transport
//! failure and is retried the same way, as does a response that does not
//! arrive within the policy's response timeout (a queued server holding
//! another client). A timed-out request may still be applied once the
//! server reaches it.

use crate::codec::{decode_json, encode_json, frame_codec};
use crate::endpoint::{self, ClientConnection, Endpoint};
use crate::protocol::{Action, BUSY_MESSAGE, Request, Response};
use futures::{SinkExt, StreamExt};
use honeyfs_core::config::{ClientConfig, DEFAULT_MAX_FRAME_BYTES};
use honeyfs_core::{Error, ListFilter, Result};
use std::io;
use std::time::Duration;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

type Connection = Framed<ClientConnection, LengthDelimitedCodec>;

/// Default bound on the wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Bound on a single connect
    pub connect_timeout: Duration,
    /// Bound on the wait for a response once the request is sent
    pub response_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from the `[client]` configuration section.
    #[must_use]
    pub const fn from_config(client: &ClientConfig) -> Self {
        Self {
            attempts: client.attempts,
            delay: Duration::from_millis(client.retry_delay_ms),
            connect_timeout: Duration::from_millis(client.connect_timeout_ms),
            response_timeout: Duration::from_millis(client.response_timeout_ms),
        }
    }

    /// A single attempt with the given connect timeout.
    #[must_use]
    pub const fn no_retry(connect_timeout: Duration) -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            connect_timeout,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Replaces the response timeout.
    #[must_use]
    pub const fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }
}

enum ExchangeError {
    /// Nothing was applied; try again.
    Retry(io::Error),
    /// Give up now.
    Fatal(Error),
}

/// Client for one control endpoint.
///
/// # Examples
///
/// ```no_run
/// use honeyfs_control::{ControlClient, Endpoint};
///
/// # async fn example() -> honeyfs_core::Result<()> {
/// let mut client = ControlClient::new(Endpoint::resolve("honeyfs_control"));
/// let response = client.create_directory(r"\TestMCP").await?;
/// assert!(response.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControlClient {
    endpoint: Endpoint,
    retry: RetryPolicy,
    max_frame_bytes: usize,
    conn: Option<Connection>,
}

impl ControlClient {
    /// Creates a client with the default retry policy. Nothing is
    /// connected until the first command.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            retry: RetryPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            conn: None,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the frame size limit for responses.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// The target endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns `true` while a connection is held open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Drops the held connection, if any.
    pub fn disconnect(&mut self) {
        self.conn = None;
    }

    /// Sends one request and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the server cannot be reached or does
    /// not answer within the retry policy or the channel breaks
    /// mid-exchange, and
    /// [`Error::Protocol`] if the response cannot be decoded.
    pub async fn send_command(&mut self, request: &Request) -> Result<Response> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay).await;
            }

            match self.exchange(request).await {
                Ok(response) => return Ok(response),
                Err(ExchangeError::Fatal(e)) => return Err(e),
                Err(ExchangeError::Retry(e)) => {
                    warn!(
                        endpoint = %self.endpoint,
                        attempt,
                        attempts,
                        error = %e,
                        "control channel unavailable"
                    );
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or_else(|| io::Error::other("no attempt was made"));
        Err(self.endpoint.transport_error(source))
    }

    async fn exchange(
        &mut self,
        request: &Request,
    ) -> std::result::Result<Response, ExchangeError> {
        let reused = self.conn.is_some();
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.connect().await.map_err(ExchangeError::Retry)?,
        };

        // A held connection the server has since closed fails here without
        // the request having been applied, so it is safe to retry.
        let broken = |e: io::Error| {
            if reused {
                ExchangeError::Retry(e)
            } else {
                ExchangeError::Fatal(self.endpoint.transport_error(e))
            }
        };

        let payload = encode_json(request).map_err(ExchangeError::Fatal)?;
        conn.send(payload).await.map_err(broken)?;

        let Ok(next) = tokio::time::timeout(self.retry.response_timeout, conn.next()).await else {
            return Err(ExchangeError::Retry(io::Error::new(
                io::ErrorKind::TimedOut,
                "no response within the response timeout",
            )));
        };
        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(broken(e)),
            None => {
                return Err(broken(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before a response arrived",
                )));
            }
        };

        let response: Response = decode_json(&frame).map_err(ExchangeError::Fatal)?;
        if response.is_busy() {
            return Err(ExchangeError::Retry(io::Error::new(
                io::ErrorKind::ResourceBusy,
                BUSY_MESSAGE,
            )));
        }

        self.conn = Some(conn);
        Ok(response)
    }

    async fn connect(&self) -> io::Result<Connection> {
        debug!(endpoint = %self.endpoint, "connecting to control channel");
        let connecting = endpoint::connect(&self.endpoint);
        let stream = tokio::time::timeout(self.retry.connect_timeout, connecting)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        Ok(Framed::new(stream, frame_codec(self.max_frame_bytes)))
    }

    /// Creates a directory and its ancestors.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn create_directory(&mut self, path: &str) -> Result<Response> {
        self.send_command(&Request::new(Action::CreateDirectory, path))
            .await
    }

    /// Creates or overwrites a file.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn create_file(&mut self, path: &str, content: &[u8]) -> Result<Response> {
        self.send_command(&Request::create_file(path, content)).await
    }

    /// Deletes a file or empty directory.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn delete(&mut self, path: &str) -> Result<Response> {
        self.send_command(&Request::new(Action::DeleteFile, path))
            .await
    }

    /// Lists the children of a directory.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn list(&mut self, path: &str, filter: ListFilter) -> Result<Response> {
        let action = match filter {
            ListFilter::Files => Action::ListFiles,
            ListFilter::Directories => Action::ListDirectories,
            ListFilter::All => Action::ListAll,
        };
        self.send_command(&Request::new(action, path)).await
    }
}
