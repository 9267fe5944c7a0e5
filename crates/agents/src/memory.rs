//! Conversational memory of the specialist.

use serde::{Deserialize, Serialize};
use std::fmt;
use techassist_llm::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRole {
    User,
    Assistant,
}

impl MemoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryRole::User => "user",
            MemoryRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MemoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: MemoryRole,
    pub content: String,
}

impl MemoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MemoryRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MemoryRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&MemoryMessage> for ChatMessage {
    fn from(message: &MemoryMessage) -> Self {
        match message.role {
            MemoryRole::User => ChatMessage::user(message.content.clone()),
            MemoryRole::Assistant => ChatMessage::assistant(message.content.clone()),
        }
    }
}

/// Ordered turn history, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    messages: Vec<MemoryMessage>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: MemoryMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(MemoryMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(MemoryMessage::assistant(content));
    }

    pub fn messages(&self) -> &[MemoryMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use techassist_llm::ChatRole;

    #[test]
    fn test_buffer_keeps_order_and_clears() {
        let mut memory = MemoryBuffer::new();
        memory.push_user("How do I install?");
        memory.push_assistant("Run the installer.");
        memory.push_user("And on Linux?");

        let roles: Vec<MemoryRole> = memory.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MemoryRole::User, MemoryRole::Assistant, MemoryRole::User]);
        assert_eq!(memory.len(), 3);

        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_converts_to_chat_messages() {
        let message = MemoryMessage::assistant("done");
        let chat: ChatMessage = (&message).into();
        assert_eq!(chat.role, ChatRole::Assistant);
        assert_eq!(chat.content, "done");
    }
}
