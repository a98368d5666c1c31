//! honeyfs CLI library.
//!
//! Argument definitions, subcommands, output formatting and logging setup
//! for the `honeyfs` binary, exposed as a library so they can be tested.
//!
//! # Architecture
//!
//! - `serve` - run the decoy service until interrupted
//! - `ctl` - send one command to a running service
//! - `completions` - generate shell completions

#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod commands;
pub mod formatters;
pub mod logging;

pub use cli::{Cli, Commands, CtlAction, ServeArgs};
