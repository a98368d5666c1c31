//! CLI argument definitions and parsing.
//!
//! - `Cli` - Main CLI entry point
//! - `Commands` - Available subcommands
//! - `CtlAction` - Control channel commands

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// honeyfs - decoy file system with access logging and runtime control.
#[derive(Parser, Debug)]
#[command(name = "honeyfs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: <config dir>/honeyfs/config.toml)
    #[arg(short, long, global = true, env = "HONEYFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    pub format: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the decoy service until interrupted.
    ///
    /// Loads the bulk manifest, starts the control channel and records
    /// every access to the projected namespace.
    ///
    /// # Examples
    ///
    /// ```bash
    /// honeyfs serve --manifest /etc/honeyfs/decoys.json
    /// honeyfs serve --manifest decoys.json --mountpoint /srv/share
    /// ```
    Serve(ServeArgs),

    /// Send a command to a running service.
    ///
    /// Exits with 1 when the service rejects the command and 3 when it
    /// cannot be reached.
    ///
    /// # Examples
    ///
    /// ```bash
    /// honeyfs ctl mkdir '\TestMCP'
    /// honeyfs ctl put '\TestMCP\test_file.txt' --content hello
    /// honeyfs ctl ls '\TestMCP' --files
    /// ```
    Ctl {
        /// Control channel name or socket path (overrides the config file)
        #[arg(long)]
        endpoint: Option<String>,

        /// Command to send
        #[command(subcommand)]
        action: CtlAction,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell for completion generation
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags of `serve`; each overrides the matching config file key.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Control channel name or socket path
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Bulk-load manifest
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Mount the decoy tree on this directory (needs the `fuse` feature)
    #[arg(long)]
    pub mountpoint: Option<PathBuf>,
}

impl Commands {
    /// Whether the command reads the service configuration.
    #[must_use]
    pub const fn needs_config(&self) -> bool {
        !matches!(self, Self::Completions { .. })
    }
}

/// Commands understood by the control channel.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CtlAction {
    /// Create a directory and any missing ancestors
    Mkdir {
        /// Directory path
        path: String,
    },

    /// Create or overwrite a file
    Put {
        /// File path
        path: String,

        /// Inline file content
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,

        /// Read the content from a local file
        #[arg(long = "from-file")]
        from_file: Option<PathBuf>,

        /// Treat --content as base64
        #[arg(long, requires = "content")]
        base64: bool,
    },

    /// Delete a file or empty directory
    Rm {
        /// Path to delete
        path: String,
    },

    /// List the children of a directory
    Ls {
        /// Directory path
        #[arg(default_value = "/")]
        path: String,

        /// Only files
        #[arg(long, conflicts_with = "dirs")]
        files: bool,

        /// Only directories
        #[arg(long)]
        dirs: bool,
    },
}
