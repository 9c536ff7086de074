// Chat domain models - users, messages and the actions the engine emits.
//
// These are pure domain types with no platform dependencies. The transport
// layer (IRC, websocket, a console in the demo binary) converts outbound
// actions into whatever its wire format is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// A chat participant, identified by their case-normalized username.
///
/// Chat platforms report the same account as "Alice", "alice" or "ALICE"
/// depending on where the event came from, so the name is normalized once at
/// construction and every map keyed by user relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    name: String,
}

impl ChatUser {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChatUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A single inbound chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    sender: ChatUser,
    channel: String,
    payload: String,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message stamped with the current wall clock.
    pub fn new(sender: ChatUser, channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::at(sender, channel, payload, Utc::now())
    }

    /// Build a message with an explicit timestamp.
    pub fn at(
        sender: ChatUser,
        channel: impl Into<String>,
        payload: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender,
            channel: channel.into(),
            payload: payload.into(),
            timestamp,
        }
    }

    pub fn sender(&self) -> &ChatUser {
        &self.sender
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The payload reduced to its comparable form: trimmed and lowercased.
    /// Repetition and blocked-message checks compare simple payloads so that
    /// "Hello", "hello" and "hello " count as the same message.
    pub fn simple_payload(&self) -> String {
        self.payload.trim().to_lowercase()
    }

    /// Fraction of payload characters (after lowercasing) that belong to the
    /// permitted set. An empty payload counts as fully legal; the ASCII-art
    /// guard additionally requires a minimum length before it consults this.
    pub fn legal_char_ratio(&self, permitted: &str) -> f32 {
        let lowered = self.payload.to_lowercase();
        let total = lowered.chars().count();
        if total == 0 {
            return 1.0;
        }
        let legal = lowered.chars().filter(|c| permitted.contains(*c)).count();
        legal as f32 / total as f32
    }
}

/// What the engine wants done in response to a message.
///
/// Actions are plain data so the engine stays testable without a live
/// connection; the host forwards them to its `Transport` in order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    /// Post a message to the public channel.
    ChannelMessage { channel: String, text: String },
    /// Send a private message to one user.
    Whisper { user: ChatUser, text: String },
    /// Temporarily silence a user. The reason is carried for the action log;
    /// the user sees it via the whisper the engine emits alongside.
    Timeout {
        channel: String,
        user: ChatUser,
        duration: Duration,
        reason: String,
    },
}

/// Delivery port implemented by the host's chat connection.
///
/// Calls are fire-and-forget: the core never consumes a return value and
/// never retries, so implementations handle their own failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_channel_message(&self, text: &str, channel: &str);
    async fn send_user_whisper(&self, text: &str, user: &ChatUser);
    async fn send_timeout(&self, channel: &str, user: &ChatUser, duration: Duration);
}

/// Forward an action list to a transport, preserving order.
pub async fn route_actions<T: Transport + ?Sized>(transport: &T, actions: &[OutboundAction]) {
    for action in actions {
        match action {
            OutboundAction::ChannelMessage { channel, text } => {
                transport.send_channel_message(text, channel).await;
            }
            OutboundAction::Whisper { user, text } => {
                transport.send_user_whisper(text, user).await;
            }
            OutboundAction::Timeout {
                channel,
                user,
                duration,
                reason: _,
            } => {
                transport.send_timeout(channel, user, *duration).await;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
