//! In-memory [`BotApi`] used by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use enoch_core::ChatId;

use crate::api::{BotApi, Chat, Message, Update};
use crate::error::{Result, TelegramError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Message { chat: ChatId, text: String },
    Typing { chat: ChatId },
    Document { chat: ChatId, filename: String, len: usize },
}

/// Records every outbound call and replays scripted `getUpdates` results.
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<Recorded>>,
    polls: Mutex<VecDeque<Result<Vec<Update>>>>,
    offsets: Mutex<Vec<Option<i64>>>,
    /// Outbound calls allowed to succeed before every later one fails.
    fail_after: Option<usize>,
}

impl RecordingApi {
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    pub fn push_poll(&self, result: Result<Vec<Update>>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Recorded::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().clone()
    }

    fn record(&self, call: Recorded) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if calls.len() >= limit {
                return Err(transport_error());
            }
        }
        calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl BotApi for RecordingApi {
    async fn get_updates(&self, offset: Option<i64>, _timeout_secs: u64) -> Result<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                // Nothing scripted: behave like an idle long poll.
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.record(Recorded::Message {
            chat,
            text: text.to_string(),
        })
    }

    async fn send_typing(&self, chat: ChatId) -> Result<()> {
        self.record(Recorded::Typing { chat })
    }

    async fn send_document(&self, chat: ChatId, filename: &str, content: Vec<u8>) -> Result<()> {
        self.record(Recorded::Document {
            chat,
            filename: filename.to_string(),
            len: content.len(),
        })
    }
}

/// A failure shaped like a dropped connection.
pub fn transport_error() -> TelegramError {
    TelegramError::Teloxide(teloxide::RequestError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    )))
}

pub fn text_update(update_id: i64, chat: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            text: Some(text.to_string()),
            chat: Chat { id: ChatId(chat) },
        }),
        edited_message: None,
    }
}

pub fn edited_update(update_id: i64, chat: i64, text: &str) -> Update {
    let mut update = text_update(update_id, chat, text);
    update.edited_message = update.message.take();
    update
}
