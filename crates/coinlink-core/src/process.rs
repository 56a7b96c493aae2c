//! External command execution.
//!
//! Line I/O and all packet-filter, shaping and connection-tracking directives
//! run as external programs. [`CommandRunner`] is the seam that lets tests
//! substitute a simulated network stack or GPIO chip.

use std::io;
use std::process::Command;

use tracing::debug;

/// Typed result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status zero.
    Success { stdout: String },
    /// Ran, but exited non-zero (or was killed by a signal).
    Failed { code: Option<i32>, stderr: String },
    /// Program is not installed.
    Absent,
}

impl CommandOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success { .. })
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, CommandOutcome::Absent)
    }

    /// Captured stdout, empty unless successful.
    pub fn stdout(&self) -> &str {
        match self {
            CommandOutcome::Success { stdout } => stdout,
            _ => "",
        }
    }
}

/// Runs external programs synchronously.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> CommandOutcome;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> CommandOutcome {
        debug!(program, args = ?args, "exec");

        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => CommandOutcome::Success {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            },
            Ok(output) => CommandOutcome::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => CommandOutcome::Absent,
            Err(e) => CommandOutcome::Failed {
                code: None,
                stderr: e.to_string(),
            },
        }
    }
}

/// Build an owned argument vector from string slices.
pub fn args<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
