//! enoch-exec: runs the external agent CLI for one prompt.
//!
//! Two strategies:
//! - `Terminal`: wraps the agent in the `script` helper so it sees a TTY
//! - `Direct`: plain child process with piped stdio
//!
//! The terminal strategy falls back to `Direct` once when the agent reports
//! that no terminal is available. A single deadline covers both attempts.

pub mod command;
pub mod error;
pub mod executor;

pub use error::{ExecError, Result};
pub use executor::{Executor, ExecutorConfig, Heartbeat, Strategy};
