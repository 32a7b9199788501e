//! Shared configuration, error and domain types for the enoch relay.

pub mod args;
pub mod config;
pub mod error;
pub mod types;

pub use config::EnochConfig;
pub use error::{EnochError, Result};
pub use types::{ChatId, Job, Role, TraceId};
