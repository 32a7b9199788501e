//! The message-processing pipeline shared by every chat transport.
//!
//! - [`context::ContextWindow`]: bounded per-chat history folded into prompts
//! - [`queue::JobQueue`]: bounded hand-off with pause/resume and status
//! - [`worker::Worker`]: the single consumer that runs the agent
//! - [`commands`]: control command parsing and execution

pub mod commands;
pub mod context;
pub mod error;
pub mod queue;
pub mod worker;

pub use commands::{Command, CommandReply, Dispatcher};
pub use context::{ContextEntry, ContextWindow};
pub use error::EnqueueError;
pub use queue::{EnqueueAck, JobQueue, JobReceiver, WorkerStatus};
pub use worker::{AgentRunner, ReplySink, Worker};
