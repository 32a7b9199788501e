//! The worker's outbound side, backed by the Bot API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use enoch_agent::ReplySink;
use enoch_core::{ChatId, TraceId};

use crate::api::BotApi;
use crate::error::TelegramError;
use crate::send;
use crate::typing::LivenessHandle;

pub struct TelegramSink<A> {
    api: Arc<A>,
    typing: Option<Duration>,
    progress: Option<Duration>,
}

impl<A: BotApi + 'static> TelegramSink<A> {
    /// `None` disables the corresponding liveness ticker.
    pub fn new(api: Arc<A>, typing: Option<Duration>, progress: Option<Duration>) -> Self {
        Self {
            api,
            typing,
            progress,
        }
    }
}

#[async_trait]
impl<A: BotApi + 'static> ReplySink for TelegramSink<A> {
    type Liveness = LivenessHandle;
    type Error = TelegramError;

    fn start_liveness(&self, chat: ChatId, trace: &TraceId) -> LivenessHandle {
        LivenessHandle::start(
            Arc::clone(&self.api),
            chat,
            trace.clone(),
            self.typing,
            self.progress,
        )
    }

    async fn send_reply(&self, chat: ChatId, text: &str, _trace: &TraceId) -> Result<(), TelegramError> {
        send::deliver_reply(self.api.as_ref(), chat, text).await
    }
}
