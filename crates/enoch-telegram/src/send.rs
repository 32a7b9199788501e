//! Outbound delivery helpers.
//!
//! Telegram's message limit is 4096 characters. Agent replies up to three
//! messages long are chunked; anything longer goes out as a single
//! `reply.txt` attachment. The choice is made before the first send.

use enoch_core::ChatId;
use tracing::debug;

use crate::api::BotApi;
use crate::error::Result;

/// Maximum characters per Telegram message.
pub const REPLY_LIMIT: usize = 4096;
/// Replies needing more chunks than this are sent as a document.
pub const MAX_REPLY_CHUNKS: usize = 3;
/// Command results above this many characters are always sent as a document.
pub const COMMAND_TEXT_LIMIT: usize = 3500;
pub const REPLY_FILE: &str = "reply.txt";

/// How a reply will be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Chunks(Vec<String>),
    Document { filename: String, body: String },
}

/// Split `text` into pieces of at most `limit` characters.
///
/// Counts Unicode scalar values, so no character is ever cut in half.
/// Concatenating the pieces gives back `text`.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Decide how an agent reply goes out.
pub fn plan_reply(text: &str) -> Delivery {
    let chunks = split_message(text, REPLY_LIMIT);
    if chunks.len() > MAX_REPLY_CHUNKS {
        Delivery::Document {
            filename: REPLY_FILE.to_string(),
            body: text.to_string(),
        }
    } else {
        Delivery::Chunks(chunks)
    }
}

/// Send an agent reply, chunked or as an attachment. Stops at the first failed send.
pub async fn deliver_reply<A: BotApi + ?Sized>(api: &A, chat: ChatId, text: &str) -> Result<()> {
    match plan_reply(text) {
        Delivery::Chunks(chunks) => {
            let total = chunks.len();
            for (i, chunk) in chunks.iter().enumerate() {
                api.send_message(chat, chunk).await?;
                debug!(chat_id = %chat, chunk = i + 1, total, "reply chunk sent");
            }
            Ok(())
        }
        Delivery::Document { filename, body } => {
            debug!(chat_id = %chat, chars = body.chars().count(), "reply sent as document");
            api.send_document(chat, &filename, body.into_bytes()).await
        }
    }
}

/// Send a command result as one message, or as `filename` when it is too long.
pub async fn send_text_or_document<A: BotApi + ?Sized>(
    api: &A,
    chat: ChatId,
    filename: &str,
    text: &str,
) -> Result<()> {
    if text.chars().count() <= COMMAND_TEXT_LIMIT {
        api.send_message(chat, text).await
    } else {
        api.send_document(chat, filename, text.as_bytes().to_vec()).await
    }
}
