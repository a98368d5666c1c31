//! Command implementations for the `honeyfs` CLI.
//!
//! Each module runs one subcommand and returns the process exit code.

pub mod completions;
pub mod ctl;
pub mod serve;
