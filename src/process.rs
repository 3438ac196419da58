//! Synchronous invocation of external tools.

use std::ffi::{OsStr, OsString};
use std::process::Command;

use log::info;

use crate::error::{Error, Result};

/// Runs a command to completion.
pub trait CommandRunner {
    /// Runs `argv` (program first). Any non-zero exit is an error.
    fn run(&self, argv: &[OsString]) -> Result<()>;
}

/// Spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[OsString]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Validation("cannot run an empty command".to_string()))?;

        let command = render_command(argv);
        info!("{}", command);

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| Error::Subprocess {
                command: command.clone(),
                status: format!("failed to start: {}", e),
            })?;

        if !status.success() {
            return Err(Error::Subprocess {
                command,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

/// Formats an argument vector for logs, quoting arguments with whitespace.
pub fn render_command(argv: &[OsString]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &OsStr) -> String {
    let s = arg.to_string_lossy();
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        s.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command(&argv(&["cfx5export", "-cgns", "-out", "/tmp/a b/1"])),
            "cfx5export -cgns -out '/tmp/a b/1'"
        );
        assert_eq!(render_command(&argv(&["echo", ""])), "echo ''");
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            ProcessRunner.run(&[]),
            Err(Error::Validation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_success() {
        ProcessRunner.run(&argv(&["true"])).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_error() {
        let err = ProcessRunner
            .run(&argv(&["sh", "-c", "exit 3"]))
            .unwrap_err();
        match err {
            Error::Subprocess { command, status } => {
                assert_eq!(command, "sh -c 'exit 3'");
                assert!(status.contains('3'), "status was {}", status);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_program_is_error() {
        let err = ProcessRunner
            .run(&argv(&["cfdbox-no-such-program-here"]))
            .unwrap_err();
        assert!(matches!(err, Error::Subprocess { .. }));
        assert!(err.to_string().contains("failed to start"));
    }
}
