//! Domain types shared by the poller, the worker and the delivery layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram chat identifier. One conversation per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Correlation token tying together every log line of one request.
///
/// Derived from the platform update identifier: `update_id=<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn from_update(update_id: i64) -> Self {
        Self(format!("update_id={update_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Author of a context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One inbound message waiting for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub chat_id: ChatId,
    pub text: String,
    pub trace: TraceId,
}

impl Job {
    pub fn new(chat_id: ChatId, text: impl Into<String>, trace: TraceId) -> Self {
        Self {
            chat_id,
            text: text.into(),
            trace,
        }
    }
}
