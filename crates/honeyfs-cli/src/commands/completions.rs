//! Shell completion generation command.

use clap::Command;
use clap_complete::{Shell, generate};
use honeyfs_core::cli::ExitCode;
use std::io::{self, Write};
use tracing::debug;

/// Writes the completion script for `shell` to `out`.
pub fn generate_completions(shell: Shell, cmd: &mut Command, out: &mut dyn Write) {
    debug!(%shell, "generating completions");
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, out);
}

/// Prints the completion script for `shell` to stdout.
#[must_use]
pub fn run(shell: Shell, cmd: &mut Command) -> ExitCode {
    generate_completions(shell, cmd, &mut io::stdout());
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::CommandFactory;

    fn script(shell: Shell) -> String {
        let mut out = Vec::new();
        generate_completions(shell, &mut Cli::command(), &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bash_completions_cover_subcommands() {
        let script = script(Shell::Bash);
        assert!(script.contains("honeyfs"));
        assert!(script.contains("serve"));
        assert!(script.contains("ctl"));
    }

    #[test]
    fn test_zsh_and_fish_completions() {
        assert!(!script(Shell::Zsh).is_empty());
        assert!(script(Shell::Fish).contains("mkdir"));
    }
}
