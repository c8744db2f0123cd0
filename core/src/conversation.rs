//! Conversation Transcript
//!
//! The ordered message history the model worker feeds to the language
//! model. The first message is always the persona system prompt; everything
//! after it is the alternating user/assistant exchange, append-only for the
//! life of the process.
//!
//! The message shape serializes directly to the Ollama chat wire format
//! (`{"role": "user", "content": "..."}`), so the backend can send the
//! snapshot without any translation.

use serde::{Deserialize, Serialize};

/// Who authored a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The fixed persona prompt.
    System,
    /// The person at the keyboard.
    User,
    /// The model.
    Assistant,
}

/// One message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored this message.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Create a new message.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only conversation with a fixed system-prompt prefix.
///
/// Owned exclusively by the model worker; other components only ever see
/// reply text carried on events.
#[derive(Clone, Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create a conversation seeded with the persona system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::new(ChatRole::System, system_prompt)],
        }
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::User, content));
    }

    /// Append an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages
            .push(ChatMessage::new(ChatRole::Assistant, content));
    }

    /// Read-only snapshot of the full history, system prompt first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent message, if any beyond the system prompt exist.
    pub fn last(&self) -> Option<&ChatMessage> {
        match self.messages.last() {
            Some(msg) if msg.role != ChatRole::System => Some(msg),
            _ => None,
        }
    }

    /// Number of messages including the system prompt.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether only the system prompt is present.
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }

    /// Drop everything except the system prompt.
    pub fn clear_history(&mut self) {
        self.messages.truncate(1);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_system_prompt_is_first() {
        let conversation = Conversation::new("be brief");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, ChatRole::System);
        assert_eq!(conversation.messages()[0].content, "be brief");
        assert!(conversation.is_empty());
        assert!(conversation.last().is_none());
    }

    #[test]
    fn test_append_order() {
        let mut conversation = Conversation::new("persona");
        conversation.push_user("hello");
        conversation.push_assistant("greetings");
        conversation.push_user("again");

        let roles: Vec<ChatRole> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(conversation.last().unwrap().content, "again");
    }

    #[test]
    fn test_clear_history_keeps_system_prompt() {
        let mut conversation = Conversation::new("persona");
        conversation.push_user("hello");
        conversation.push_assistant("hi");

        conversation.clear_history();

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, "persona");
    }

    #[test]
    fn test_wire_format() {
        let message = ChatMessage::new(ChatRole::Assistant, "reply");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "reply");
    }
}
