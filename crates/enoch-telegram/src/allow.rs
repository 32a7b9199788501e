//! Chat allow-list for the Telegram adapter.
//!
//! Open by default: an empty setting lets every chat through. Otherwise the
//! chat id, rendered in its canonical decimal form, must match exactly.

use enoch_core::ChatId;

/// Returns `true` when `chat` may talk to the bot.
pub fn is_allowed(allowed_chat_id: &str, chat: ChatId) -> bool {
    let allowed = allowed_chat_id.trim();
    allowed.is_empty() || chat.to_string() == allowed
}
