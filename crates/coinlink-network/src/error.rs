//! Error types for the enforcement layer.
//!
//! Per-device directives are best-effort and never return these; only the
//! bootstrap and the address lookups do.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// A required tool (packet filter, shaper) is not installed.
    #[error("Required tool not installed: {program}")]
    ToolUnavailable { program: String },

    /// Bootstrap command failed.
    #[error("{program} failed: {message}")]
    CommandFailed { program: String, message: String },

    /// The neighbour table could not be read.
    #[error("Cannot read neighbour table {path}: {source}")]
    ArpTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NetworkError {
    pub fn tool_unavailable(program: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            program: program.into(),
        }
    }

    pub fn command_failed(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            program: program.into(),
            message: message.into(),
        }
    }
}
