// Runtime policy: the tunable thresholds behind spam enforcement and link
// repetition. Mutations go through `with_set`, which returns a replacement
// value instead of editing fields in place.

use thiserror::Error;

/// Characters that do not count toward the ASCII-art ratio check.
pub const PERMITTED_CHARS: &str = "abcdefghijklmnopqrstuvwxyz.!@$%1234567890";

/// Lowest value `repetition_search` may be clamped to when `maxmsg` shrinks.
const MIN_REPETITION_SEARCH: usize = 2;

// ===== ERRORS =====

/// Rejections for the `set` admin command. Each variant renders as the chat
/// response sent back to the issuing admin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{variable} must be between {low} and {high}")]
    OutOfRange {
        variable: &'static str,
        low: u32,
        high: u32,
    },
    #[error("repetitionSearch must be between 1 and maxmsg")]
    RepetitionSearchRange,
    #[error("messageFrequency must be more than 60")]
    FrequencyTooLow,
    #[error("Variable name not found")]
    UnknownVariable,
    #[error("Syntax Error.")]
    Syntax,
}

// ===== POLICY =====

/// One coherent snapshot of the moderation thresholds.
///
/// Readers capture the whole value per message, so a concurrent `set` can
/// never expose a half-applied configuration. The version counter increments
/// on every successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimePolicy {
    version: u64,
    max_tracked_messages: usize,
    link_repeat_count_host: u32,
    link_repeat_count_mod: u32,
    messages_per_second: f32,
    repetition_search: usize,
    permitted_chars: &'static str,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self {
            version: 0,
            max_tracked_messages: 20, // history window per channel
            link_repeat_count_host: 7,
            link_repeat_count_mod: 5,
            messages_per_second: 2.5,
            repetition_search: 4, // lookback depth for duplicate payloads
            permitted_chars: PERMITTED_CHARS,
        }
    }
}

/// Outcome of a successful `set`: the replacement policy plus the chat ack.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyUpdate {
    pub policy: RuntimePolicy,
    pub ack: String,
}

impl RuntimePolicy {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn max_tracked_messages(&self) -> usize {
        self.max_tracked_messages
    }

    pub fn link_repeat_count_host(&self) -> u32 {
        self.link_repeat_count_host
    }

    pub fn link_repeat_count_mod(&self) -> u32 {
        self.link_repeat_count_mod
    }

    pub fn messages_per_second(&self) -> f32 {
        self.messages_per_second
    }

    pub fn repetition_search(&self) -> usize {
        self.repetition_search
    }

    pub fn permitted_chars(&self) -> &str {
        self.permitted_chars
    }

    /// Applies `set <variable> <value>` for the variables this policy owns.
    ///
    /// Variable names match case-insensitively; integral fields truncate the
    /// supplied value. On success the returned policy carries a bumped
    /// version and the ack to post back to the admin.
    pub fn with_set(&self, variable: &str, value: f64) -> Result<PolicyUpdate, PolicyError> {
        let mut next = self.clone();
        let ack = match variable.to_lowercase().as_str() {
            "maxmsg" => {
                if !(value > 0.0 && value <= 200.0) {
                    return Err(PolicyError::OutOfRange {
                        variable: "maxmsg",
                        low: 0,
                        high: 200,
                    });
                }
                next.max_tracked_messages = value as usize;
                // Shrinking the window can strand the lookback depth past the
                // new cap; pull it back inside, but never below the minimum.
                let cap = next.max_tracked_messages.saturating_sub(1);
                if next.repetition_search > cap {
                    next.repetition_search = cap.max(MIN_REPETITION_SEARCH);
                }
                format!("maxmsg set to {}", next.max_tracked_messages)
            }
            "linkrepeatcounthost" => {
                if !(value > 0.0 && value <= 40.0) {
                    return Err(PolicyError::OutOfRange {
                        variable: "linkRepeatCountHost",
                        low: 0,
                        high: 40,
                    });
                }
                next.link_repeat_count_host = value as u32;
                format!("linkRepeatCountHost set to {}", next.link_repeat_count_host)
            }
            "linkrepeatcountmod" => {
                if !(value > 0.0 && value <= 40.0) {
                    return Err(PolicyError::OutOfRange {
                        variable: "linkRepeatCountMod",
                        low: 0,
                        high: 40,
                    });
                }
                next.link_repeat_count_mod = value as u32;
                format!("linkRepeatCountMod set to {}", next.link_repeat_count_mod)
            }
            "messagespersecond" => {
                if !(value > 0.0 && value <= 50.0) {
                    return Err(PolicyError::OutOfRange {
                        variable: "messagesPerSecond",
                        low: 0,
                        high: 50,
                    });
                }
                next.messages_per_second = value as f32;
                format!("messagesPerSecond set to {}", next.messages_per_second)
            }
            "repetitionsearch" => {
                let cap = self.max_tracked_messages.saturating_sub(1) as f64;
                if !(value > 1.0 && value <= cap) {
                    return Err(PolicyError::RepetitionSearchRange);
                }
                next.repetition_search = value as usize;
                format!("repetitionSearch set to {}", next.repetition_search)
            }
            _ => return Err(PolicyError::UnknownVariable),
        };
        next.version = self.version + 1;
        Ok(PolicyUpdate { policy: next, ack })
    }
}

// ===== TESTS =====
