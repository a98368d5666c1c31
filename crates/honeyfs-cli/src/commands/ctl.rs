//! The `ctl` command: send one command to a running service.

use crate::cli::CtlAction;
use crate::formatters::{CommandReport, format_output};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use colored::Colorize;
use honeyfs_control::{Action, ControlClient, Endpoint, Request, RetryPolicy};
use honeyfs_core::ServiceConfig;
use honeyfs_core::cli::{ExitCode, OutputFormat};
use std::io::{self, Write};
use tracing::debug;

/// Translates a `ctl` subcommand into a wire request.
///
/// # Errors
///
/// Returns an error if `--from-file` cannot be read or `--content` is not
/// valid base64 under `--base64`.
pub fn build_request(action: &CtlAction) -> Result<Request> {
    let request = match action {
        CtlAction::Mkdir { path } => Request::new(Action::CreateDirectory, path.as_str()),
        CtlAction::Rm { path } => Request::new(Action::DeleteFile, path.as_str()),
        CtlAction::Ls { path, files, dirs } => {
            let action = if *files {
                Action::ListFiles
            } else if *dirs {
                Action::ListDirectories
            } else {
                Action::ListAll
            };
            Request::new(action, path.as_str())
        }
        CtlAction::Put {
            path,
            content,
            from_file,
            base64,
        } => {
            let body = match (content, from_file) {
                (_, Some(file)) => std::fs::read(file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
                (Some(content), None) if *base64 => STANDARD
                    .decode(content)
                    .context("--content is not valid base64")?,
                (Some(content), None) => content.clone().into_bytes(),
                (None, None) => Vec::new(),
            };
            Request::create_file(path.as_str(), &body)
        }
    };
    Ok(request)
}

/// Sends `action` through `client` and writes the report to `out`.
///
/// A rejected command yields [`ExitCode::REJECTED`], an unreachable
/// service [`ExitCode::TRANSPORT`].
///
/// # Errors
///
/// Returns an error only if the report cannot be formatted or written.
pub async fn execute(
    client: &mut ControlClient,
    action: &CtlAction,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> Result<ExitCode> {
    let request = match build_request(action) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return Ok(ExitCode::INVALID_INPUT);
        }
    };
    debug!(action = %request.action, path = ?request.path, "sending control command");

    let response = match client.send_command(&request).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return Ok(ExitCode::for_error(&e));
        }
    };

    let exit_code = if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::REJECTED
    };
    let report = CommandReport {
        action: request.action,
        path: request.path.unwrap_or_default(),
        response,
    };
    writeln!(out, "{}", format_output(&report, format)?)?;
    Ok(exit_code)
}

/// Runs `ctl` against the configured (or overridden) endpoint.
///
/// # Errors
///
/// See [`execute`].
pub async fn run(
    config: &ServiceConfig,
    endpoint: Option<String>,
    action: &CtlAction,
    format: OutputFormat,
) -> Result<ExitCode> {
    let name = endpoint.unwrap_or_else(|| config.control.endpoint.clone());
    let mut client = ControlClient::new(Endpoint::resolve(&name))
        .with_retry(RetryPolicy::from_config(&config.client))
        .with_max_frame_bytes(config.control.max_frame_bytes);
    execute(&mut client, action, format, &mut io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn put(content: Option<&str>, from_file: Option<PathBuf>, base64: bool) -> CtlAction {
        CtlAction::Put {
            path: r"\TestMCP\test_file.txt".to_string(),
            content: content.map(str::to_string),
            from_file,
            base64,
        }
    }

    #[test]
    fn test_build_list_requests() {
        let ls = |files, dirs| CtlAction::Ls {
            path: "/TestMCP".to_string(),
            files,
            dirs,
        };
        assert_eq!(build_request(&ls(false, false)).unwrap().action, "list_all");
        assert_eq!(build_request(&ls(true, false)).unwrap().action, "list_files");
        assert_eq!(
            build_request(&ls(false, true)).unwrap().action,
            "list_directories"
        );
    }

    #[test]
    fn test_build_mkdir_and_rm() {
        let req = build_request(&CtlAction::Mkdir {
            path: r"\TestMCP".to_string(),
        })
        .unwrap();
        assert_eq!(req.action, "create_directory");
        assert_eq!(req.path.as_deref(), Some(r"\TestMCP"));

        let req = build_request(&CtlAction::Rm {
            path: "/a".to_string(),
        })
        .unwrap();
        assert_eq!(req.action, "delete_file");
    }

    #[test]
    fn test_build_put_inline() {
        let req = build_request(&put(Some("hello"), None, false)).unwrap();
        assert_eq!(req.action, "create_file");
        assert_eq!(req.decoded_content().unwrap(), b"hello");
    }

    #[test]
    fn test_build_put_base64() {
        let req = build_request(&put(Some("AJ+Slg=="), None, true)).unwrap();
        assert_eq!(req.decoded_content().unwrap(), [0x00, 0x9f, 0x92, 0x96]);
    }

    #[test]
    fn test_build_put_invalid_base64() {
        let err = build_request(&put(Some("not base64!"), None, true)).unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_build_put_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("body.bin");
        std::fs::write(&file, [0xff, 0x00, 0x41]).unwrap();

        let req = build_request(&put(None, Some(file), false)).unwrap();
        assert_eq!(req.decoded_content().unwrap(), [0xff, 0x00, 0x41]);
    }

    #[test]
    fn test_build_put_empty() {
        let req = build_request(&put(None, None, false)).unwrap();
        assert!(req.decoded_content().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_unreachable_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::from_address(dir.path().join("none.sock").to_string_lossy());
        let mut client = ControlClient::new(endpoint)
            .with_retry(RetryPolicy::no_retry(std::time::Duration::from_millis(100)));

        let mut out = Vec::new();
        let code = execute(
            &mut client,
            &CtlAction::Mkdir {
                path: "/a".to_string(),
            },
            OutputFormat::Text,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::TRANSPORT);
        assert!(out.is_empty());
    }
}
