//! Output formatters for CLI commands.
//!
//! Every `ctl` invocation produces one [`CommandReport`], printed as JSON,
//! plain text or colored output.

use anyhow::Result;
use colored::Colorize;
use honeyfs_control::Response;
use honeyfs_core::cli::OutputFormat;
use serde::Serialize;

/// The outcome of one control command, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    /// Wire action name
    pub action: String,
    /// Path as given on the command line
    pub path: String,
    /// The service's answer
    #[serde(flatten)]
    pub response: Response,
}

/// Format a report according to the specified output format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Examples
///
/// ```
/// use honeyfs_cli::formatters::{CommandReport, format_output};
/// use honeyfs_control::Response;
/// use honeyfs_core::cli::OutputFormat;
///
/// let report = CommandReport {
///     action: "list_files".to_string(),
///     path: "/TestMCP".to_string(),
///     response: Response::listing(vec!["test_file.txt".to_string()]),
/// };
///
/// let output = format_output(&report, OutputFormat::Text)?;
/// assert_eq!(output, "test_file.txt");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output(report: &CommandReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::format(report),
        OutputFormat::Text => Ok(text::format(report)),
        OutputFormat::Pretty => Ok(pretty::format(report)),
    }
}

/// JSON output formatting.
pub mod json {
    use super::{Result, Serialize};

    /// Format data as JSON with 2-space indentation.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let json = serde_json::to_string_pretty(data)?;
        Ok(json)
    }
}

/// Plain text output formatting, one listing entry per line.
pub mod text {
    use super::CommandReport;

    /// Format a report as plain text.
    #[must_use]
    pub fn format(report: &CommandReport) -> String {
        let response = &report.response;
        if !response.success {
            return format!(
                "error: {}",
                response.message.as_deref().unwrap_or("command failed")
            );
        }
        response
            .data
            .as_ref()
            .map_or_else(|| "ok".to_string(), |entries| entries.join("\n"))
    }
}

/// Pretty (human-readable) output formatting.
pub mod pretty {
    use super::{Colorize, CommandReport};
    use std::fmt::Write;

    /// Format a report as colorized output.
    #[must_use]
    pub fn format(report: &CommandReport) -> String {
        let response = &report.response;
        let mut out = String::new();

        if !response.success {
            let message = response.message.as_deref().unwrap_or("command failed");
            let _ = write!(
                out,
                "{} {} {}: {}",
                "✗".red().bold(),
                report.action.bold(),
                report.path,
                message.red()
            );
            return out;
        }

        let _ = write!(
            out,
            "{} {} {}",
            "✓".green().bold(),
            report.action.bold(),
            report.path
        );

        if let Some(entries) = &response.data {
            if entries.is_empty() {
                let _ = write!(out, "\n  {}", "(empty)".dimmed());
            }
            for entry in entries {
                let _ = write!(out, "\n  {}", entry.cyan());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(response: Response) -> CommandReport {
        CommandReport {
            action: "list_all".to_string(),
            path: r"\TestMCP".to_string(),
            response,
        }
    }

    #[test]
    fn test_json_format_flattens_response() {
        let output = json::format(&report(Response::listing(vec!["a".into()]))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["action"], "list_all");
        assert_eq!(value["success"], true);
        assert_eq!(value["data"][0], "a");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_text_format_listing() {
        let output = text::format(&report(Response::listing(vec![
            "a.txt".into(),
            "b.txt".into(),
        ])));
        assert_eq!(output, "a.txt\nb.txt");
    }

    #[test]
    fn test_text_format_empty_listing() {
        assert_eq!(text::format(&report(Response::listing(Vec::new()))), "");
    }

    #[test]
    fn test_text_format_ok_and_failure() {
        assert_eq!(text::format(&report(Response::ok())), "ok");
        assert_eq!(
            text::format(&report(Response::failure("no such file or directory: /x"))),
            "error: no such file or directory: /x"
        );
    }

    #[test]
    fn test_pretty_format() {
        colored::control::set_override(false);
        let output = pretty::format(&report(Response::listing(vec!["keys".into()])));
        assert!(output.starts_with("✓ list_all"));
        assert!(output.contains("\n  keys"));

        let output = pretty::format(&report(Response::failure("directory not empty: /a")));
        assert!(output.starts_with("✗ list_all"));
        assert!(output.ends_with("directory not empty: /a"));
    }

    #[test]
    fn test_format_output_dispatch() {
        let r = report(Response::ok());
        assert!(format_output(&r, OutputFormat::Json).unwrap().contains("\"success\": true"));
        assert_eq!(format_output(&r, OutputFormat::Text).unwrap(), "ok");
        assert!(format_output(&r, OutputFormat::Pretty).unwrap().contains("list_all"));
    }
}
