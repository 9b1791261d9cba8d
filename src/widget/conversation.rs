//! Conversation log.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::chatbase::ApiMessage;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

/// A message shown in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    /// Local wall-clock time the message was created, as `HH:MM`.
    pub timestamp: String,
}

impl Message {
    /// Create a message stamped with the current local time.
    #[must_use]
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: time_string(),
        }
    }

    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Map to the chat endpoint's request schema.
    #[must_use]
    pub fn to_api(&self) -> ApiMessage {
        match self.sender {
            Sender::Bot => ApiMessage::assistant(self.text.clone()),
            Sender::User => ApiMessage::user(self.text.clone()),
        }
    }
}

/// Current local time formatted for message timestamps.
#[must_use]
pub fn time_string() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Append-only sequence of messages.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation opened by a bot greeting.
    #[must_use]
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::bot(greeting));
        conversation
    }

    /// Append a message and return its index.
    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether `text` would repeat the immediately preceding user message.
    #[must_use]
    pub fn repeats_last_user(&self, text: &str) -> bool {
        self.last()
            .is_some_and(|m| m.sender == Sender::User && m.text == text)
    }

    /// Request messages for the whole log followed by a new user message.
    #[must_use]
    pub fn api_messages_with(&self, next_user_text: &str) -> Vec<ApiMessage> {
        self.messages
            .iter()
            .map(Message::to_api)
            .chain(std::iter::once(ApiMessage::user(next_user_text)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbase::ApiRole;

    #[test]
    fn test_greeting_conversation() {
        let conversation = Conversation::with_greeting("Hello! How can I help you?");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].sender, Sender::Bot);
    }

    #[test]
    fn test_push_returns_index() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.push(Message::user("a")), 0);
        assert_eq!(conversation.push(Message::bot("b")), 1);
        assert_eq!(conversation.get(1).unwrap().text, "b");
    }

    #[test]
    fn test_repeat_detection_only_for_user() {
        let mut conversation = Conversation::with_greeting("hi");
        assert!(!conversation.repeats_last_user("hi"));

        conversation.push(Message::user("hi"));
        assert!(conversation.repeats_last_user("hi"));
        assert!(!conversation.repeats_last_user("hi "));
    }

    #[test]
    fn test_api_mapping() {
        let conversation = Conversation::with_greeting("Hello!");
        let api = conversation.api_messages_with("hi");
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, ApiRole::Assistant);
        assert_eq!(api[0].content, "Hello!");
        assert_eq!(api[1].role, ApiRole::User);
        assert_eq!(api[1].content, "hi");
    }

    #[test]
    fn test_timestamp_format() {
        let message = Message::user("x");
        assert_eq!(message.timestamp.len(), 5);
        assert_eq!(&message.timestamp[2..3], ":");
    }
}
