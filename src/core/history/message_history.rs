// Sliding-window message history - the evidence store behind spam detection.
//
// A bounded FIFO of recent messages. Guards never read the live store; they
// take an immutable snapshot, so a check sees one consistent view even while
// further messages arrive.

use super::chat::{ChatMessage, ChatUser};
use std::collections::VecDeque;
use std::time::Duration;

pub struct MessageHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entries once over capacity.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        self.evict();
    }

    /// Re-bound the window (driven by `set maxmsg`). Shrinking evicts the
    /// oldest messages immediately.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// An immutable copy of the current window, oldest first.
    pub fn snapshot(&self) -> MessageSnapshot {
        self.messages.iter().cloned().collect()
    }

    fn evict(&mut self) {
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }
}

/// An immutable view over a sequence of messages, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageSnapshot {
    messages: Vec<ChatMessage>,
}

impl MessageSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Time between the oldest and newest message. Zero with fewer than two
    /// messages, and saturates to zero if timestamps ever run backwards.
    pub fn time_span(&self) -> Duration {
        match (self.messages.first(), self.messages.last()) {
            (Some(first), Some(last)) => (last.timestamp() - first.timestamp())
                .to_std()
                .unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Count messages whose simple payload matches `text`, ignoring case and
    /// any trailing whitespace on the query: "msg1", "MSG1" and "msg1 " all
    /// count occurrences of "msg1".
    pub fn count_simple_payload(&self, text: &str) -> usize {
        let lowered = text.to_lowercase();
        let needle = lowered.trim_end();
        self.messages
            .iter()
            .filter(|m| m.simple_payload() == needle)
            .count()
    }

    /// Messages sent by one user, order preserved.
    pub fn for_user(&self, user: &ChatUser) -> MessageSnapshot {
        self.messages
            .iter()
            .filter(|m| m.sender() == user)
            .cloned()
            .collect()
    }

    /// Messages sent to one channel, order preserved.
    pub fn for_channel(&self, channel: &str) -> MessageSnapshot {
        self.messages
            .iter()
            .filter(|m| m.channel() == channel)
            .cloned()
            .collect()
    }
}

impl FromIterator<ChatMessage> for MessageSnapshot {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
