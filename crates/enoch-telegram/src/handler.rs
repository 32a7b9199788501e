//! Per-update handling: filter, allow-list, command interception, enqueue.

use std::sync::Arc;

use enoch_agent::{Command, CommandReply, Dispatcher, EnqueueAck, EnqueueError, JobQueue};
use enoch_core::{ChatId, Job, TraceId};
use enoch_exec::command::preview;
use tracing::{error, info, warn};

use crate::allow;
use crate::api::{BotApi, Update};
use crate::send;

pub const ACK_QUEUED: &str = "Queued, please wait.";
pub const ACK_QUEUED_PAUSED: &str = "Paused; your message is queued.";
pub const ACK_QUEUE_FULL: &str = "Queue is full, please try again later.";

/// Characters of message text shown in logs.
const LOG_PREVIEW_CHARS: usize = 160;

/// What happened to one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoMessage,
    EmptyText,
    NotAllowed,
    Command(Command),
    Enqueued(EnqueueAck),
    Rejected(EnqueueError),
}

pub struct UpdateHandler<A> {
    api: Arc<A>,
    queue: Arc<JobQueue>,
    dispatcher: Arc<Dispatcher>,
    allowed_chat_id: String,
}

impl<A: BotApi> UpdateHandler<A> {
    pub fn new(
        api: Arc<A>,
        queue: Arc<JobQueue>,
        dispatcher: Arc<Dispatcher>,
        allowed_chat_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            queue,
            dispatcher,
            allowed_chat_id: allowed_chat_id.into(),
        }
    }

    /// Route one update. Never fails: send errors are logged and dropped.
    pub async fn handle(&self, update: &Update) -> Outcome {
        let trace = TraceId::from_update(update.update_id);

        let Some(message) = update.body() else {
            warn!(trace = %trace, reason = "no_message", "update ignored");
            return Outcome::NoMessage;
        };
        let chat = message.chat.id;
        let text = message.text.as_deref().unwrap_or_default();
        if text.is_empty() {
            warn!(trace = %trace, chat_id = %chat, reason = "empty_text", "message ignored");
            return Outcome::EmptyText;
        }

        info!(
            trace = %trace,
            chat_id = %chat,
            text = %preview(text, LOG_PREVIEW_CHARS),
            "message received"
        );

        if !allow::is_allowed(&self.allowed_chat_id, chat) {
            warn!(trace = %trace, chat_id = %chat, allowed = %self.allowed_chat_id, "message from chat not on allow-list");
            return Outcome::NotAllowed;
        }

        if let Some(command) = Command::parse(text) {
            let reply = self.dispatcher.execute(chat, &command, &trace);
            self.send_command_reply(chat, reply, &trace).await;
            return Outcome::Command(command);
        }

        match self.queue.try_enqueue(Job::new(chat, text, trace.clone())) {
            Ok(ack) => {
                let text = match ack {
                    EnqueueAck::Queued => ACK_QUEUED,
                    EnqueueAck::QueuedWhilePaused => ACK_QUEUED_PAUSED,
                };
                self.send_text(chat, text, &trace).await;
                Outcome::Enqueued(ack)
            }
            Err(e) => {
                warn!(trace = %trace, chat_id = %chat, error = %e, "job rejected");
                self.send_text(chat, ACK_QUEUE_FULL, &trace).await;
                Outcome::Rejected(e)
            }
        }
    }

    async fn send_command_reply(&self, chat: ChatId, reply: CommandReply, trace: &TraceId) {
        let result = match &reply {
            CommandReply::Text(text) => self.api.send_message(chat, text).await,
            CommandReply::TextOrDocument { filename, text } => {
                send::send_text_or_document(self.api.as_ref(), chat, filename, text).await
            }
        };
        if let Err(e) = result {
            error!(trace = %trace, error = %e, "command reply failed");
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str, trace: &TraceId) {
        if let Err(e) = self.api.send_message(chat, text).await {
            error!(trace = %trace, error = %e, "sendMessage failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use enoch_agent::{ContextWindow, JobReceiver};
    use enoch_memory::NotebookManager;

    use crate::api::Message;
    use crate::testing::{edited_update, text_update, Recorded, RecordingApi};

    use super::*;

    struct Fixture {
        handler: UpdateHandler<RecordingApi>,
        api: Arc<RecordingApi>,
        queue: Arc<JobQueue>,
        _rx: JobReceiver,
        _dir: tempfile::TempDir,
    }

    fn fixture(capacity: usize, allowed: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let (queue, rx) = JobQueue::new(capacity);
        let queue = Arc::new(queue);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&queue),
            Arc::new(ContextWindow::new(4)),
            Arc::new(NotebookManager::new(dir.path())),
        ));
        let api = Arc::new(RecordingApi::default());
        Fixture {
            handler: UpdateHandler::new(Arc::clone(&api), Arc::clone(&queue), dispatcher, allowed),
            api,
            queue,
            _rx: rx,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn plain_text_is_enqueued_and_acked() {
        let f = fixture(4, "");
        let outcome = f.handler.handle(&text_update(10, 55, "build it")).await;
        assert_eq!(outcome, Outcome::Enqueued(EnqueueAck::Queued));
        assert_eq!(f.queue.depth(), 1);
        assert_eq!(
            f.api.calls(),
            vec![Recorded::Message { chat: ChatId(55), text: ACK_QUEUED.to_string() }]
        );
    }

    #[tokio::test]
    async fn edited_message_is_used_when_no_fresh_one() {
        let f = fixture(4, "");
        let outcome = f.handler.handle(&edited_update(11, 55, "fixed typo")).await;
        assert_eq!(outcome, Outcome::Enqueued(EnqueueAck::Queued));
    }

    #[tokio::test]
    async fn updates_without_text_are_skipped_silently() {
        let f = fixture(4, "");
        let bare = Update { update_id: 1, message: None, edited_message: None };
        assert_eq!(f.handler.handle(&bare).await, Outcome::NoMessage);

        let photo = Update {
            update_id: 2,
            message: Some(Message {
                message_id: 1,
                text: None,
                chat: crate::api::Chat { id: ChatId(55) },
            }),
            edited_message: None,
        };
        assert_eq!(f.handler.handle(&photo).await, Outcome::EmptyText);
        assert!(f.api.calls().is_empty());
        assert_eq!(f.queue.depth(), 0);
    }

    #[tokio::test]
    async fn other_chats_are_dropped_without_reply() {
        let f = fixture(4, "55");
        assert_eq!(f.handler.handle(&text_update(3, 56, "hi")).await, Outcome::NotAllowed);
        assert!(f.api.calls().is_empty());
        assert_eq!(
            f.handler.handle(&text_update(4, 55, "hi")).await,
            Outcome::Enqueued(EnqueueAck::Queued)
        );
    }

    #[tokio::test]
    async fn commands_are_not_enqueued() {
        let f = fixture(4, "");
        let outcome = f.handler.handle(&text_update(5, 55, "/stop")).await;
        assert_eq!(outcome, Outcome::Command(Command::Stop));
        assert!(f.queue.is_paused());
        assert_eq!(f.queue.depth(), 0);

        let outcome = f.handler.handle(&text_update(6, 55, "please run")).await;
        assert_eq!(outcome, Outcome::Enqueued(EnqueueAck::QueuedWhilePaused));
        assert_eq!(f.api.texts().last().map(String::as_str), Some(ACK_QUEUED_PAUSED));
    }

    #[tokio::test]
    async fn unknown_slash_text_is_a_normal_message() {
        let f = fixture(4, "");
        let outcome = f.handler.handle(&text_update(7, 55, "/deploy prod")).await;
        assert_eq!(outcome, Outcome::Enqueued(EnqueueAck::Queued));
    }

    #[tokio::test]
    async fn full_queue_is_acked_immediately() {
        let f = fixture(1, "");
        f.handler.handle(&text_update(8, 55, "one")).await;
        let outcome = f.handler.handle(&text_update(9, 55, "two")).await;
        assert_eq!(outcome, Outcome::Rejected(EnqueueError::QueueFull));
        assert_eq!(f.api.texts(), vec![ACK_QUEUED, ACK_QUEUE_FULL]);
    }

    #[tokio::test]
    async fn status_reply_is_sent_as_text() {
        let f = fixture(4, "");
        f.handler.handle(&text_update(12, 55, "/status")).await;
        let texts = f.api.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("State: running"));
    }
}
