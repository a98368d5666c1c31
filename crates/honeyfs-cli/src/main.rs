//! `honeyfs` command-line entry point.
//!
//! # Examples
//!
//! ```bash
//! # Run the service with a bulk manifest
//! honeyfs serve --manifest /etc/honeyfs/decoys.json
//!
//! # Reshape it from another terminal
//! honeyfs ctl mkdir '\TestMCP'
//! honeyfs ctl put '\TestMCP\test_file.txt' --content hello
//! honeyfs --format json ctl ls '\TestMCP'
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use honeyfs_cli::commands;
use honeyfs_cli::{Cli, Commands, logging};
use honeyfs_core::ServiceConfig;
use honeyfs_core::cli::{ExitCode, OutputFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match prepare(&cli) {
        Ok((format, config)) => match execute_command(cli, format, config).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{} {e:#}", "error:".red().bold());
                failure_code(&e)
            }
        },
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::INVALID_INPUT
        }
    };

    std::process::exit(exit_code.as_i32());
}

/// Exit code for an error that escaped a command.
fn failure_code(error: &anyhow::Error) -> ExitCode {
    error
        .downcast_ref::<honeyfs_core::Error>()
        .map_or(ExitCode::REJECTED, ExitCode::for_error)
}

/// Parses the output format and loads the configuration if the command
/// needs one.
fn prepare(cli: &Cli) -> Result<(OutputFormat, ServiceConfig)> {
    let format = cli.format.parse::<OutputFormat>()?;
    let config = if cli.command.needs_config() {
        ServiceConfig::load_or_default(cli.config.as_deref())
            .context("failed to load configuration")?
    } else {
        ServiceConfig::default()
    };
    Ok((format, config))
}

/// Routes the command to its handler and returns the exit code.
async fn execute_command(
    cli: Cli,
    format: OutputFormat,
    mut config: ServiceConfig,
) -> Result<ExitCode> {
    match cli.command {
        Commands::Serve(args) => {
            commands::serve::apply_overrides(&mut config, args);
            let log_dir = config.access.log_dir.as_deref();
            let _guard = logging::init(cli.verbose, &config.log.level, log_dir)?;
            commands::serve::run(&config).await
        }
        Commands::Ctl { endpoint, action } => {
            let _guard = logging::init(cli.verbose, &config.log.level, None)?;
            commands::ctl::run(&config, endpoint, &action, format).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            Ok(commands::completions::run(shell, &mut cmd))
        }
    }
}
