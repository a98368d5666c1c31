//! Core types, path canonicalisation, configuration and errors for honeyfs.
//!
//! honeyfs serves a synthetic directory tree of decoy files, records every
//! access to it, and lets a remote controller reshape the tree at runtime.
//! This crate holds what every other crate in the workspace agrees on.
//!
//! # Architecture
//!
//! - [`NodePath`]: the canonical path type; the only way into the namespace
//! - [`Error`] / [`ErrorKind`]: the closed error taxonomy
//! - [`node`]: node kinds, mode bits, metadata snapshots, listing filters
//! - [`config`]: the TOML service configuration
//! - [`cli`]: output format and exit codes of the `honeyfs` binary

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;

pub mod cli;
pub mod config;
pub mod node;
pub mod path;

pub use config::{BusyPolicy, ServiceConfig, WriteRetention};
pub use error::{Error, ErrorKind, Result};
pub use node::{ListFilter, NodeKind, NodeMeta};
pub use path::NodePath;
