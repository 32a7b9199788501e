//! Per-chat conversation history, bounded to the most recent `max` entries.

use std::collections::VecDeque;

use dashmap::DashMap;
use enoch_core::{ChatId, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub role: Role,
    pub text: String,
}

/// Bounded recent history per chat.
///
/// A `max` of 0 disables the window: appends are ignored and prompts are
/// passed through verbatim. The map shards its locks, so different chats
/// never contend.
pub struct ContextWindow {
    max: usize,
    entries: DashMap<ChatId, VecDeque<ContextEntry>>,
}

impl ContextWindow {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            entries: DashMap::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max
    }

    pub fn is_enabled(&self) -> bool {
        self.max > 0
    }

    /// Append one entry, evicting the oldest ones past `max`.
    /// Blank text is ignored.
    pub fn append(&self, chat: ChatId, role: Role, text: &str) {
        if !self.is_enabled() {
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut history = self.entries.entry(chat).or_default();
        history.push_back(ContextEntry {
            role,
            text: text.to_string(),
        });
        while history.len() > self.max {
            history.pop_front();
        }
    }

    /// Snapshot of a chat's history, oldest first.
    pub fn get(&self, chat: ChatId) -> Vec<ContextEntry> {
        self.entries
            .get(&chat)
            .map(|h| h.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn reset(&self, chat: ChatId) {
        self.entries.remove(&chat);
    }

    /// Entries held across every chat.
    pub fn total_entries(&self) -> usize {
        self.entries.iter().map(|h| h.value().len()).sum()
    }

    /// Fold the chat's history in front of `text`.
    ///
    /// ```text
    /// Conversation history:
    /// User: ...
    /// Assistant: ...
    /// User: <text>
    /// ```
    pub fn build_prompt(&self, chat: ChatId, text: &str) -> String {
        if !self.is_enabled() {
            return text.to_string();
        }
        let history = self.get(chat);
        if history.is_empty() {
            return text.to_string();
        }
        let mut out = String::from("Conversation history:\n");
        for entry in &history {
            out.push_str(&format!("{}: {}\n", entry.role, entry.text));
        }
        out.push_str(&format!("{}: {}", Role::User, text));
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const CHAT: ChatId = ChatId(7);

    #[test]
    fn disabled_window_ignores_appends_and_passes_prompt_through() {
        let ctx = ContextWindow::new(0);
        ctx.append(CHAT, Role::User, "hello");
        assert!(ctx.get(CHAT).is_empty());
        assert_eq!(ctx.build_prompt(CHAT, "raw"), "raw");
    }

    #[test]
    fn blank_text_is_ignored() {
        let ctx = ContextWindow::new(4);
        ctx.append(CHAT, Role::User, "  \n ");
        assert!(ctx.get(CHAT).is_empty());
    }

    #[test]
    fn keeps_most_recent_entries_in_order() {
        let ctx = ContextWindow::new(3);
        for i in 0..10 {
            ctx.append(CHAT, Role::User, &format!("m{i}"));
        }
        let texts: Vec<String> = ctx.get(CHAT).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn chats_are_independent_and_reset_is_scoped() {
        let ctx = ContextWindow::new(4);
        ctx.append(ChatId(1), Role::User, "a");
        ctx.append(ChatId(2), Role::User, "b");
        ctx.append(ChatId(2), Role::Assistant, "c");
        assert_eq!(ctx.total_entries(), 3);

        ctx.reset(ChatId(2));
        assert!(ctx.get(ChatId(2)).is_empty());
        assert_eq!(ctx.get(ChatId(1)).len(), 1);
        assert_eq!(ctx.total_entries(), 1);
    }

    #[test]
    fn prompt_renders_transcript_before_message() {
        let ctx = ContextWindow::new(4);
        assert_eq!(ctx.build_prompt(CHAT, "first"), "first");

        ctx.append(CHAT, Role::User, "first");
        ctx.append(CHAT, Role::Assistant, " answer \n");
        assert_eq!(
            ctx.build_prompt(CHAT, "second"),
            "Conversation history:\nUser: first\nAssistant: answer\nUser: second"
        );
    }

    #[test]
    fn concurrent_appends_respect_bound() {
        let ctx = Arc::new(ContextWindow::new(5));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        ctx.append(CHAT, Role::User, &format!("{t}-{i}"));
                        ctx.append(ChatId(t), Role::Assistant, "x");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ctx.get(CHAT).len(), 5);
        for t in 0..8 {
            assert!(ctx.get(ChatId(t)).len() <= 5);
        }
    }
}
