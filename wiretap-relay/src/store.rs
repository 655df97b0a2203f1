//! # Message Store
//!
//! Append-only log of every message that has passed through the
//! server. Serves double duty: conversation history for clients and
//! the interception feed for the attacker.

use crate::message::Message;

/// In-memory append-only message log. Never persisted; resets with
/// the process.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the log.
    pub fn append(&mut self, message: Message) {
        tracing::info!(
            sender = %message.sender,
            recipient = %message.recipient,
            encrypted = message.encrypted,
            "logged message"
        );
        self.messages.push(message);
    }

    /// All logged messages, insertion order.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    /// Messages between the unordered pair `{a, b}`, sorted ascending
    /// by timestamp. The sort is textual; the fixed-width timestamp
    /// format makes that chronological.
    pub fn conversation(&self, a: &str, b: &str) -> Vec<Message> {
        let mut result: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.between(a, b))
            .cloned()
            .collect();
        result.sort_by(|x, y| x.timestamp.cmp(&y.timestamp));
        result
    }

    /// Drop all logged messages.
    pub fn clear(&mut self) {
        self.messages.clear();
        tracing::info!("cleared message log");
    }

    /// Number of logged messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
