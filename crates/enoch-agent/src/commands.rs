//! Control commands, intercepted before a message becomes a job.
//!
//! Recognized (first token is case-sensitive):
//!   `/status`  `/stop`  `/resume`  `/reset`  `/help`
//!   `/memory add|search|today ...` and the `/memory_add` style aliases
//!
//! Anything else starting with `/` is not a command and goes to the agent.

use std::path::Path;
use std::sync::Arc;

use enoch_core::{ChatId, TraceId};
use enoch_memory::{NotebookManager, SearchMatch};
use tracing::{error, info};

use crate::context::ContextWindow;
use crate::queue::JobQueue;

/// Hits returned by `/memory search`.
pub const SEARCH_LIMIT: usize = 5;
/// Lines returned by `/memory today`.
pub const TODAY_SUMMARY_LINES: usize = 20;
/// Attachment name used when search results are too long for a message.
pub const SEARCH_RESULTS_FILE: &str = "memory_search.txt";

const HELP_TEXT: &str = "Commands\n\
    /status - show worker and queue state\n\
    /stop - pause processing of queued messages\n\
    /resume - resume processing\n\
    /reset - clear this chat's conversation context\n\
    /memory add <text> - append a note to today's memory file\n\
    /memory search <keyword> - search memory files\n\
    /memory today - show today's summary\n\
    /help - show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Stop,
    Resume,
    Reset,
    Help,
    MemoryAdd(String),
    MemorySearch(String),
    MemoryToday,
}

impl Command {
    /// Parse a control command. Returns `None` for ordinary messages.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let mut parts: Vec<&str> = trimmed.split_whitespace().collect();
        let mut name = parts.first()?.to_string();
        if name == "/memory" && parts.len() >= 2 {
            name = format!("/memory_{}", parts[1].to_lowercase());
            parts.remove(1);
        }
        let rest = parts[1..].join(" ");

        let command = match name.as_str() {
            "/status" => Self::Status,
            "/stop" => Self::Stop,
            "/resume" => Self::Resume,
            "/reset" => Self::Reset,
            "/help" => Self::Help,
            "/memory_add" => Self::MemoryAdd(rest),
            "/memory_search" => Self::MemorySearch(rest),
            "/memory_today" => Self::MemoryToday,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Stop => "stop",
            Self::Resume => "resume",
            Self::Reset => "reset",
            Self::Help => "help",
            Self::MemoryAdd(_) => "memory_add",
            Self::MemorySearch(_) => "memory_search",
            Self::MemoryToday => "memory_today",
        }
    }
}

/// What the transport should send back for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Text(String),
    /// Sent as a message when short enough, otherwise as an attachment.
    TextOrDocument { filename: String, text: String },
}

impl CommandReply {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text(text) | Self::TextOrDocument { text, .. } => text,
        }
    }
}

/// Executes commands against the shared queue, context window and notebook.
pub struct Dispatcher {
    queue: Arc<JobQueue>,
    context: Arc<ContextWindow>,
    memory: Arc<NotebookManager>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<JobQueue>,
        context: Arc<ContextWindow>,
        memory: Arc<NotebookManager>,
    ) -> Self {
        Self {
            queue,
            context,
            memory,
        }
    }

    pub fn execute(&self, chat: ChatId, command: &Command, trace: &TraceId) -> CommandReply {
        info!(trace = %trace, chat_id = %chat, command = command.name(), "command");
        match command {
            Command::Status => CommandReply::Text(self.status_text()),
            Command::Stop => {
                self.queue.pause();
                CommandReply::text("Paused. New messages will be queued but not processed.")
            }
            Command::Resume => {
                self.queue.resume();
                CommandReply::text("Resumed processing.")
            }
            Command::Reset => {
                self.context.reset(chat);
                CommandReply::text("Conversation context cleared.")
            }
            Command::Help => CommandReply::text(HELP_TEXT),
            Command::MemoryAdd(text) => self.memory_add(text, trace),
            Command::MemorySearch(keyword) => self.memory_search(keyword, trace),
            Command::MemoryToday => self.memory_today(trace),
        }
    }

    pub fn status_text(&self) -> String {
        let status = self.queue.status();
        let trace = status
            .current_trace
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "State: {}\nProcessing: {}\nQueue depth: {}/{}\nCurrent job: {}\nContext size: {}\nContext entries: {}",
            if status.paused { "paused" } else { "running" },
            if status.running { "yes" } else { "no" },
            status.queue_depth,
            status.capacity,
            trace,
            self.context.max_size(),
            self.context.total_entries(),
        )
    }

    fn memory_add(&self, text: &str, trace: &TraceId) -> CommandReply {
        let text = text.trim();
        if text.is_empty() {
            return CommandReply::text("Usage: /memory add <text> (or /memory_add <text>)");
        }
        match self.memory.add_entry(text) {
            Ok(path) => CommandReply::Text(format!("Saved to {}", file_name(&path))),
            Err(e) => {
                error!(trace = %trace, error = %e, "memory add failed");
                CommandReply::text("Failed to write memory, please try again later.")
            }
        }
    }

    fn memory_search(&self, keyword: &str, trace: &TraceId) -> CommandReply {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return CommandReply::text(
                "Usage: /memory search <keyword> (or /memory_search <keyword>)",
            );
        }
        match self.memory.search(keyword, SEARCH_LIMIT) {
            Ok(matches) if matches.is_empty() => CommandReply::text("No matches found."),
            Ok(matches) => CommandReply::TextOrDocument {
                filename: SEARCH_RESULTS_FILE.to_string(),
                text: format_matches(&matches),
            },
            Err(e) => {
                error!(trace = %trace, error = %e, "memory search failed");
                CommandReply::text("Search failed, please try again later.")
            }
        }
    }

    fn memory_today(&self, trace: &TraceId) -> CommandReply {
        match self.memory.today_summary_lines(TODAY_SUMMARY_LINES) {
            Ok(lines) if lines.is_empty() => CommandReply::text("Today's summary is empty."),
            Ok(lines) => CommandReply::Text(format!(
                "Today's summary ({}):\n{}",
                self.memory.today_date(),
                lines.join("\n")
            )),
            Err(e) => {
                error!(trace = %trace, error = %e, "memory today failed");
                CommandReply::text("Today's memory file is missing or unreadable.")
            }
        }
    }
}

fn format_matches(matches: &[SearchMatch]) -> String {
    let mut out = format!("Search results (up to {SEARCH_LIMIT}):");
    for m in matches {
        out.push('\n');
        out.push_str(&m.to_string());
    }
    out
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use enoch_core::{Job, Role};

    use crate::queue::JobReceiver;

    use super::*;

    const CHAT: ChatId = ChatId(42);

    fn trace() -> TraceId {
        TraceId::from_update(1)
    }

    struct Harness {
        dispatcher: Dispatcher,
        queue: Arc<JobQueue>,
        context: Arc<ContextWindow>,
        _rx: JobReceiver,
    }

    fn harness(root: &Path) -> Harness {
        let (queue, rx) = JobQueue::new(4);
        let queue = Arc::new(queue);
        let context = Arc::new(ContextWindow::new(6));
        let memory = NotebookManager::new(root).with_clock(|| {
            NaiveDate::from_ymd_opt(2026, 3, 14)
                .and_then(|d| d.and_hms_opt(9, 30, 0))
                .unwrap()
        });
        Harness {
            dispatcher: Dispatcher::new(Arc::clone(&queue), Arc::clone(&context), Arc::new(memory)),
            queue,
            context,
            _rx: rx,
        }
    }

    #[test]
    fn parses_plain_commands() {
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("  /stop  "), Some(Command::Stop));
        assert_eq!(Command::parse("/resume now"), Some(Command::Resume));
        assert_eq!(Command::parse("/reset"), Some(Command::Reset));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
    }

    #[test]
    fn first_token_is_case_sensitive() {
        assert_eq!(Command::parse("/STATUS"), None);
        assert_eq!(Command::parse("/Stop"), None);
    }

    #[test]
    fn non_commands_fall_through() {
        assert_eq!(Command::parse("hello /status"), None);
        assert_eq!(Command::parse("/unknown thing"), None);
        assert_eq!(Command::parse("/memory"), None);
        assert_eq!(Command::parse("/memory forget x"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn memory_two_token_form_is_normalized() {
        assert_eq!(
            Command::parse("/memory add buy  milk"),
            Some(Command::MemoryAdd("buy milk".to_string()))
        );
        assert_eq!(
            Command::parse("/memory SEARCH deploy"),
            Some(Command::MemorySearch("deploy".to_string()))
        );
        assert_eq!(Command::parse("/memory today"), Some(Command::MemoryToday));
        assert_eq!(
            Command::parse("/memory_add note"),
            Some(Command::MemoryAdd("note".to_string()))
        );
        assert_eq!(Command::parse("/memory_search"), Some(Command::MemorySearch(String::new())));
    }

    #[test]
    fn stop_and_resume_toggle_pause() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let (d, queue) = (&h.dispatcher, &h.queue);

        d.execute(CHAT, &Command::Stop, &trace());
        assert!(queue.is_paused());
        assert!(d.status_text().starts_with("State: paused"));

        d.execute(CHAT, &Command::Resume, &trace());
        assert!(!queue.is_paused());
    }

    #[test]
    fn status_reports_queue_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let (d, queue, context) = (&h.dispatcher, &h.queue, &h.context);
        queue
            .try_enqueue(Job::new(CHAT, "x", TraceId::from_update(3)))
            .unwrap();
        context.append(CHAT, Role::User, "a");
        context.append(ChatId(9), Role::User, "b");

        let reply = d.execute(CHAT, &Command::Status, &trace());
        assert_eq!(
            reply.body(),
            "State: running\nProcessing: no\nQueue depth: 1/4\nCurrent job: -\nContext size: 6\nContext entries: 2"
        );
    }

    #[test]
    fn reset_only_clears_requesting_chat() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let (d, context) = (&h.dispatcher, &h.context);
        context.append(CHAT, Role::User, "mine");
        context.append(ChatId(7), Role::User, "theirs");

        d.execute(CHAT, &Command::Reset, &trace());
        assert!(context.get(CHAT).is_empty());
        assert_eq!(context.get(ChatId(7)).len(), 1);
    }

    #[test]
    fn memory_add_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let d = harness(dir.path()).dispatcher;

        let usage = d.execute(CHAT, &Command::MemoryAdd("  ".into()), &trace());
        assert!(usage.body().starts_with("Usage: /memory add"));

        let saved = d.execute(CHAT, &Command::MemoryAdd("Deploy on Friday".into()), &trace());
        assert_eq!(saved.body(), "Saved to 2026-03-14.md");

        match d.execute(CHAT, &Command::MemorySearch("deploy".into()), &trace()) {
            CommandReply::TextOrDocument { filename, text } => {
                assert_eq!(filename, SEARCH_RESULTS_FILE);
                assert!(text.starts_with("Search results (up to 5):\n2026-03-14.md:"));
                assert!(text.contains("- [09:30] Deploy on Friday"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        let none = d.execute(CHAT, &Command::MemorySearch("nothing-here".into()), &trace());
        assert_eq!(none, CommandReply::Text("No matches found.".into()));
    }

    #[test]
    fn memory_today_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let d = harness(dir.path()).dispatcher;
        let reply = d.execute(CHAT, &Command::MemoryToday, &trace());
        assert_eq!(reply.body(), "Today's memory file is missing or unreadable.");
    }

    #[test]
    fn memory_today_lists_summary_lines() {
        let dir = tempfile::tempdir().unwrap();
        let d = harness(dir.path()).dispatcher;
        let memory_dir = dir.path().join("memory");
        std::fs::create_dir_all(&memory_dir).unwrap();
        std::fs::write(
            memory_dir.join("2026-03-14.md"),
            "# 2026-03-14\n\n## Summary\n\n- shipped\n- reviewed\n\n## Context\n- other\n",
        )
        .unwrap();

        let reply = d.execute(CHAT, &Command::MemoryToday, &trace());
        assert_eq!(reply.body(), "Today's summary (2026-03-14):\n- shipped\n- reviewed");
    }
}
