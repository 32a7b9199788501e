//! Telegram transport for the enoch relay.
//!
//! - [`adapter::TelegramAdapter`]: the long-poll loop
//! - [`handler::UpdateHandler`]: allow-list, commands and enqueueing per update
//! - [`sink::TelegramSink`]: reply delivery and liveness for the worker

pub mod adapter;
pub mod allow;
pub mod api;
pub mod error;
pub mod handler;
pub mod send;
pub mod sink;
pub mod typing;

#[cfg(test)]
mod testing;

pub use adapter::TelegramAdapter;
pub use api::{BotApi, HttpBotApi};
pub use error::TelegramError;
pub use handler::UpdateHandler;
pub use sink::TelegramSink;
