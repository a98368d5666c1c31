//! Runtime control channel for a honeyfs namespace.
//!
//! A controller reshapes the decoy tree without restarting the service by
//! sending length-prefixed JSON [`Request`]s over a local channel (a Unix
//! domain socket or a Windows named pipe). The [`ControlServer`] applies
//! each one to the shared namespace and answers with a [`Response`]; the
//! [`ControlClient`] is the matching caller.
//!
//! # Wire format
//!
//! ```text
//! +----------------+-----------------------------+
//! | len: u32 (LE)  | len bytes of UTF-8 JSON     |
//! +----------------+-----------------------------+
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod client;
pub mod codec;
pub mod endpoint;
pub mod protocol;
pub mod server;

pub use client::{ControlClient, DEFAULT_RESPONSE_TIMEOUT, RetryPolicy};
pub use endpoint::Endpoint;
pub use protocol::{Action, Request, Response, dispatch};
pub use server::{ControlServer, ServerConfig, serve_connection};
