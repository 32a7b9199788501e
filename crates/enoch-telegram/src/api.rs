//! Telegram Bot API access through teloxide.
//!
//! Only the four methods the relay needs, behind [`BotApi`] so the poller and
//! delivery code can run against an in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use enoch_core::config::TelegramConfig;
use enoch_core::ChatId;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::requests::Requester;
use teloxide::types::{ChatAction, InputFile, UpdateKind};
use teloxide::{Bot, RequestError};
use tracing::debug;

use crate::error::{Result, TelegramError};

/// One inbound update, reduced to what the relay reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

impl Update {
    /// The fresh message, or the edited one when there is none.
    pub fn body(&self) -> Option<&Message> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

impl From<teloxide::types::Update> for Update {
    fn from(update: teloxide::types::Update) -> Self {
        let (message, edited_message) = match &update.kind {
            UpdateKind::Message(m) => (Some(Message::from(m)), None),
            UpdateKind::EditedMessage(m) => (None, Some(Message::from(m))),
            _ => (None, None),
        };
        Self {
            update_id: i64::from(update.id.0),
            message,
            edited_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: i64,
    pub text: Option<String>,
    pub chat: Chat,
}

impl From<&teloxide::types::Message> for Message {
    fn from(message: &teloxide::types::Message) -> Self {
        Self {
            message_id: i64::from(message.id.0),
            text: message.text().map(str::to_owned),
            chat: Chat {
                id: ChatId(message.chat.id.0),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
}

/// The Bot API surface used by the relay. Mocked in tests.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates starting at `offset`.
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>>;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Show the typing indicator.
    async fn send_typing(&self, chat: ChatId) -> Result<()>;

    /// Upload `content` as a file attachment named `filename`.
    async fn send_document(&self, chat: ChatId, filename: &str, content: Vec<u8>) -> Result<()>;
}

/// [`BotApi`] backed by a teloxide [`Bot`].
pub struct HttpBotApi {
    bot: Bot,
}

impl HttpBotApi {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let token = config.bot_token.trim();
        if token.is_empty() {
            return Err(TelegramError::NoToken);
        }
        let api_url = url::Url::parse(config.api_base.trim())?;
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(RequestError::from)?;
        let bot = Bot::with_client(token, client).set_api_url(api_url);
        Ok(Self { bot })
    }
}

fn recipient(chat: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat.0)
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut request = self
            .bot
            .get_updates()
            .timeout(u32::try_from(timeout_secs).unwrap_or(u32::MAX));
        if let Some(offset) = offset {
            request = request.offset(i32::try_from(offset).unwrap_or(i32::MAX));
        }
        let updates = request.await?;
        debug!(count = updates.len(), "getUpdates returned");
        Ok(updates.into_iter().map(Update::from).collect())
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(recipient(chat), text).await?;
        Ok(())
    }

    async fn send_typing(&self, chat: ChatId) -> Result<()> {
        self.bot
            .send_chat_action(recipient(chat), ChatAction::Typing)
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat: ChatId, filename: &str, content: Vec<u8>) -> Result<()> {
        let file = InputFile::memory(content).file_name(filename.to_owned());
        self.bot.send_document(recipient(chat), file).await?;
        Ok(())
    }
}
