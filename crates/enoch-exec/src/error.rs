//! Error types for the enoch-exec crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    /// The trimmed prompt was empty; nothing was spawned.
    #[error("empty prompt")]
    EmptyPrompt,

    /// The agent refused to run without an interactive terminal.
    #[error("terminal unavailable: {0}")]
    TerminalUnavailable(String),

    /// The deadline expired. Partial output is discarded.
    #[error("agent timeout after {secs:.1}s")]
    Timeout { secs: f64 },

    /// The agent exited non-zero.
    #[error("agent error: {detail}")]
    Command { detail: String },

    /// The agent (or the terminal helper) could not be launched.
    #[error("spawn error: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;
