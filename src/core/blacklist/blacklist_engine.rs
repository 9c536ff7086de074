// Blacklist bookkeeping: curated word and message lists, plus retroactive
// scans over recent history when a new entry is added.

use std::collections::HashSet;

use crate::core::chat::{ChatMessage, ChatUser};
use crate::core::history::MessageSnapshot;

/// Words shorter than this are rejected outright; almost every short token
/// appears inside innocent words, so blocking one would timeout half the chat.
pub const MIN_WORD_LENGTH: usize = 3;

// ===== OUTCOMES =====

/// What happened when an entry was offered to the blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistAdd {
    Added,
    TooShort,
    Duplicate,
}

/// What happened when an entry was removed from the blacklist.
/// Removing an absent entry is a negative answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistRemove {
    Removed,
    NotFound,
}

// ===== BLACKLIST =====

/// Blocked words and blocked messages for one channel.
///
/// Words match case-insensitively as substrings of a payload; messages match
/// the whole simplified payload exactly. Entries are normalized (trimmed,
/// lowercased) on insertion so live checks are a plain set probe.
#[derive(Debug, Default)]
pub struct Blacklist {
    words: HashSet<String>,
    messages: HashSet<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blocked word. Entries under [`MIN_WORD_LENGTH`] characters and
    /// entries already present are rejected, leaving the list unchanged.
    pub fn add_word(&mut self, word: &str) -> BlacklistAdd {
        let normalized = normalize(word);
        if normalized.chars().count() < MIN_WORD_LENGTH {
            return BlacklistAdd::TooShort;
        }
        if self.words.contains(&normalized) {
            return BlacklistAdd::Duplicate;
        }
        self.words.insert(normalized);
        BlacklistAdd::Added
    }

    pub fn remove_word(&mut self, word: &str) -> BlacklistRemove {
        if self.words.remove(&normalize(word)) {
            BlacklistRemove::Removed
        } else {
            BlacklistRemove::NotFound
        }
    }

    /// Adds a blocked message. No minimum length, duplicates are rejected.
    pub fn add_message(&mut self, text: &str) -> BlacklistAdd {
        let normalized = normalize(text);
        if self.messages.contains(&normalized) {
            return BlacklistAdd::Duplicate;
        }
        self.messages.insert(normalized);
        BlacklistAdd::Added
    }

    pub fn remove_message(&mut self, text: &str) -> BlacklistRemove {
        if self.messages.remove(&normalize(text)) {
            BlacklistRemove::Removed
        } else {
            BlacklistRemove::NotFound
        }
    }

    /// True if the payload contains any blocked word, case-insensitively.
    pub fn contains_blocked_word(&self, payload: &str) -> bool {
        let lowered = payload.to_lowercase();
        self.words.iter().any(|word| lowered.contains(word))
    }

    /// True if the simplified payload is exactly a blocked message.
    pub fn is_blocked_message(&self, simple_payload: &str) -> bool {
        self.messages.contains(simple_payload)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

fn normalize(entry: &str) -> String {
    entry.trim().to_lowercase()
}

// ===== RETROACTIVE SCANS =====

/// Messages in the snapshot whose payload contains `word`, excluding senders
/// the `exempt` predicate clears. Used right after a word is blacklisted to
/// catch authors who already posted it.
pub fn word_offenders<'a, F>(
    snapshot: &'a MessageSnapshot,
    word: &str,
    exempt: F,
) -> Vec<&'a ChatMessage>
where
    F: Fn(&ChatUser) -> bool,
{
    let needle = normalize(word);
    snapshot
        .iter()
        .filter(|message| message.payload().to_lowercase().contains(&needle))
        .filter(|message| !exempt(message.sender()))
        .collect()
}

/// Messages in the snapshot whose simplified payload equals `text` exactly,
/// excluding senders the `exempt` predicate clears.
pub fn message_offenders<'a, F>(
    snapshot: &'a MessageSnapshot,
    text: &str,
    exempt: F,
) -> Vec<&'a ChatMessage>
where
    F: Fn(&ChatUser) -> bool,
{
    let needle = normalize(text);
    snapshot
        .iter()
        .filter(|message| message.simple_payload() == needle)
        .filter(|message| !exempt(message.sender()))
        .collect()
}

// ===== TESTS =====
