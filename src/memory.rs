//! Conversation memory.

use crate::llm::{ChatMessage, Role};

/// Ordered, append-only log of conversation turns.
///
/// Owned by exactly one router or standalone assistant. There is no capacity
/// bound: the log grows for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    messages: Vec<ChatMessage>,
}

impl ConversationMemory {
    /// Create an empty conversation memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user turn.
    pub fn add_user_turn(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// Record an assistant turn.
    pub fn add_assistant_turn(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    /// Copy of all recorded turns, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    /// Get all messages.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Get the last N messages.
    pub fn last_n(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// History for a completion call: persona first, then every recorded turn.
    pub fn with_persona(&self, persona: &str) -> Vec<ChatMessage> {
        let mut history = Vec::with_capacity(self.messages.len() + 1);
        history.push(ChatMessage::system(persona));
        history.extend(
            self.messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        history
    }

    /// Get message count.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_keep_insertion_order() {
        let mut memory = ConversationMemory::new();
        memory.add_user_turn("Hello");
        memory.add_assistant_turn("Hi");
        memory.add_user_turn("How are you?");

        let snapshot = memory.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], ChatMessage::user("Hello"));
        assert_eq!(snapshot[1], ChatMessage::assistant("Hi"));
        assert_eq!(snapshot[2], ChatMessage::user("How are you?"));
    }

    #[test]
    fn never_truncates() {
        let mut memory = ConversationMemory::new();
        for i in 0..500 {
            memory.add_user_turn(i.to_string());
        }
        assert_eq!(memory.len(), 500);
        assert_eq!(memory.messages()[0].content, "0");
    }

    #[test]
    fn last_n() {
        let mut memory = ConversationMemory::new();
        memory.add_user_turn("1");
        memory.add_user_turn("2");
        memory.add_user_turn("3");

        let last_2 = memory.last_n(2);
        assert_eq!(last_2.len(), 2);
        assert_eq!(last_2[0].content, "2");
        assert_eq!(last_2[1].content, "3");
        assert_eq!(memory.last_n(10).len(), 3);
    }

    #[test]
    fn persona_leads_history() {
        let mut memory = ConversationMemory::new();
        memory.add_user_turn("hi");
        let history = memory.with_persona("You are terse.");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::system("You are terse."));
        assert_eq!(history[1], ChatMessage::user("hi"));
        // Snapshot is unaffected.
        assert_eq!(memory.len(), 1);
    }
}
