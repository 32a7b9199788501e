/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Transport, decode or `ok: false` failure. teloxide redacts the token.
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("invalid telegram api base url: {0}")]
    ApiBase(#[from] url::ParseError),

    #[error("no bot token configured")]
    NoToken,
}

pub type Result<T> = std::result::Result<T, TelegramError>;
