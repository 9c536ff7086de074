// Chat-facing commands: the public query commands with per-command
// cooldowns, the `!bot` admin surface, and the `set` variable router.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::America::Vancouver;

use crate::core::chat::{ChatMessage, OutboundAction};
use crate::core::permissions::PermissionTier;
use crate::core::policy::{PolicyError, RuntimePolicy};

/// Raw payloads that never count toward repetition enforcement.
pub const RESERVED_COMMAND_WORDS: [&str; 4] = ["!ttl", "!lll", "!help", "!ttt"];

/// True if the payload is exactly one of the reserved query commands.
pub fn is_reserved_command_word(payload: &str) -> bool {
    RESERVED_COMMAND_WORDS.contains(&payload)
}

const TTL_COOLDOWN_SECS: i64 = 40;
const UPTIME_COOLDOWN_SECS: i64 = 40;
const LLL_COOLDOWN_SECS: i64 = 40;
const HELP_COOLDOWN_SECS: i64 = 30;

/// Show lead times beyond this are kept quiet so the countdown only runs
/// in the days right before the next show.
const TTL_SILENCE_DAYS: i64 = 5;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// 2016-03-11 16:30 America/Vancouver, the recurring show anchor.
const DEFAULT_SHOW_ANCHOR_UTC: i64 = 1_457_742_600;
/// 2016-03-25 16:30 America/Vancouver, the last recorded stream start.
const DEFAULT_STREAM_START_UTC: i64 = 1_458_948_600;

const HELP_TEXT: &str =
    "Channel rules and the full command list are in the channel description. \
     Whisper a moderator to appeal a timeout.";

// ===== BROADCASTER TRAIT (PORT) =====

/// Periodic channel broadcaster controlled through `set` and `!loop`.
#[async_trait]
pub trait PeriodicBroadcaster: Send + Sync {
    async fn start(&self);
    async fn set_frequency(&self, seconds: u32);
    async fn toggle_enabled(&self);
    async fn add_message(&self, text: &str) -> String;
    async fn clear_last(&self) -> String;
    async fn clear_all(&self) -> String;
}

// ===== ADMIN COMMAND GRAMMAR =====

/// A parsed `!bot` sub-command.
///
/// Parsing never fails: unrecognized sub-commands become `Unknown` and
/// recognized ones with missing arguments become `Malformed`, so attacker
/// controlled text can only ever produce a canned response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    BlacklistWord(String),
    UnblacklistWord(String),
    BlacklistMessage(String),
    UnblacklistMessage(String),
    PromoteOperator { tier: PermissionTier, name: String },
    DemoteOperator(String),
    ResetStreamStart,
    Set { variable: String, value: String },
    Unknown,
    Malformed,
}

/// Parses a raw payload as a `!bot` command. Returns `None` when the payload
/// is not addressed to the bot at all.
///
/// The `!bot` prefix matches case-insensitively as its own token; the
/// sub-command tokens are case-sensitive.
pub fn parse_bot_command(payload: &str) -> Option<BotCommand> {
    let trimmed = payload.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (trimmed, ""),
    };
    if !head.eq_ignore_ascii_case("!bot") {
        return None;
    }

    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim_start()),
        None => (rest, ""),
    };

    let parsed = match command {
        "blw" => require_argument(argument, BotCommand::BlacklistWord),
        "rmblw" => require_argument(argument, BotCommand::UnblacklistWord),
        "blm" => require_argument(argument, BotCommand::BlacklistMessage),
        "rmblm" => require_argument(argument, BotCommand::UnblacklistMessage),
        "addop" => {
            let mut tokens = argument.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(tier), Some(name), None) => match tier.parse::<PermissionTier>() {
                    Ok(tier) => BotCommand::PromoteOperator {
                        tier,
                        name: name.to_string(),
                    },
                    Err(_) => BotCommand::Malformed,
                },
                _ => BotCommand::Malformed,
            }
        }
        "rmop" => require_argument(argument, BotCommand::DemoteOperator),
        "sstart" => BotCommand::ResetStreamStart,
        "set" => {
            let mut tokens = argument.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(variable), Some(value), None) => BotCommand::Set {
                    variable: variable.to_string(),
                    value: value.to_string(),
                },
                _ => BotCommand::Malformed,
            }
        }
        _ => BotCommand::Unknown,
    };
    Some(parsed)
}

fn require_argument(argument: &str, build: impl FnOnce(String) -> BotCommand) -> BotCommand {
    if argument.is_empty() {
        BotCommand::Malformed
    } else {
        build(argument.to_string())
    }
}

// ===== DISPATCHER =====

/// Per-command cooldown clocks. `None` means the command has never produced
/// a channel response, so the next one goes straight through.
#[derive(Debug, Default)]
struct CommandClocks {
    ttl: Option<DateTime<Utc>>,
    uptime: Option<DateTime<Utc>>,
    lll: Option<DateTime<Utc>>,
    help: Option<DateTime<Utc>>,
}

/// Handles the public query commands and owns the mutable command state:
/// the runtime policy, the show schedule anchors, and the last host link.
///
/// Query responses always whisper the requester; the public channel copy is
/// cooldown-gated per command so repeated queries cannot flood the chat.
pub struct CommandDispatcher {
    policy: RuntimePolicy,
    clocks: CommandClocks,
    show_anchor: DateTime<Utc>,
    stream_start: DateTime<Utc>,
    last_host_link: Option<String>,
}

impl CommandDispatcher {
    pub fn new(policy: RuntimePolicy) -> Self {
        Self {
            policy,
            clocks: CommandClocks::default(),
            show_anchor: utc_instant(DEFAULT_SHOW_ANCHOR_UTC),
            stream_start: utc_instant(DEFAULT_STREAM_START_UTC),
            last_host_link: None,
        }
    }

    pub fn policy(&self) -> &RuntimePolicy {
        &self.policy
    }

    pub fn show_anchor(&self) -> DateTime<Utc> {
        self.show_anchor
    }

    pub fn stream_start(&self) -> DateTime<Utc> {
        self.stream_start
    }

    /// Caches the most recent link posted by the channel owner.
    pub fn record_host_link(&mut self, link: impl Into<String>) {
        self.last_host_link = Some(link.into());
    }

    /// Marks the stream as live right now.
    pub fn reset_stream_start(&mut self, now: DateTime<Utc>) -> String {
        self.stream_start = now;
        "Stream start time has been set.".to_string()
    }

    /// Runs the public query commands against an inbound message. Non-command
    /// payloads and unknown commands produce no actions.
    pub fn user_command(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        let Some(body) = message.payload().strip_prefix('!') else {
            return Vec::new();
        };
        let now = message.timestamp();

        if body.eq_ignore_ascii_case("ttl") || body.eq_ignore_ascii_case("ttt") {
            let Some(text) = self.time_till_live(now) else {
                return Vec::new();
            };
            let send_to_channel = ready(&mut self.clocks.ttl, now, TTL_COOLDOWN_SECS);
            respond(message, text, send_to_channel)
        } else if body.eq_ignore_ascii_case("lll") {
            let text = match &self.last_host_link {
                Some(link) => format!("Last link posted by the host: {link}"),
                None => "The host has not posted a link recently.".to_string(),
            };
            let send_to_channel = ready(&mut self.clocks.lll, now, LLL_COOLDOWN_SECS);
            respond(message, text, send_to_channel)
        } else if body.eq_ignore_ascii_case("help") {
            let send_to_channel = ready(&mut self.clocks.help, now, HELP_COOLDOWN_SECS);
            respond(message, HELP_TEXT.to_string(), send_to_channel)
        } else if body.starts_with("uptime") {
            let text = self.uptime_text(now);
            let send_to_channel = ready(&mut self.clocks.uptime, now, UPTIME_COOLDOWN_SECS);
            respond(message, text, send_to_channel)
        } else {
            Vec::new()
        }
    }

    /// Applies `set <variable> <value>`, routing between the policy fields,
    /// the broadcaster, and the show anchor. Returns the chat response.
    pub async fn apply_set(
        &mut self,
        variable: &str,
        raw_value: &str,
        broadcaster: &dyn PeriodicBroadcaster,
    ) -> String {
        let Ok(value) = raw_value.parse::<f64>() else {
            return PolicyError::Syntax.to_string();
        };
        match variable.to_lowercase().as_str() {
            "messagefrequency" => {
                if value > 60.0 {
                    broadcaster.set_frequency(value as u32).await;
                    format!("messageFrequency set to {}", value as u32)
                } else {
                    PolicyError::FrequencyTooLow.to_string()
                }
            }
            "messagereptoggle" => {
                broadcaster.toggle_enabled().await;
                "messageRepetition toggled.".to_string()
            }
            "addstarttime" => {
                self.show_anchor += Duration::seconds(value as i64);
                format!(
                    "Show start time set to: {}",
                    self.show_anchor.with_timezone(&Vancouver)
                )
            }
            _ => match self.policy.with_set(variable, value) {
                Ok(update) => {
                    self.policy = update.policy;
                    update.ack
                }
                Err(err) => err.to_string(),
            },
        }
    }

    /// Countdown to the next show occurrence. `None` outside the announce
    /// window (more than five days ahead).
    fn time_till_live(&self, now: DateTime<Utc>) -> Option<String> {
        let next = next_occurrence(self.show_anchor, now);
        let until = next - now;
        if until > Duration::days(TTL_SILENCE_DAYS) {
            None
        } else if until < Duration::seconds(60) {
            Some("The next show should begin soon.".to_string())
        } else {
            Some(format!(
                "The next show should begin in: {}",
                human_duration(until.num_seconds())
            ))
        }
    }

    fn uptime_text(&self, now: DateTime<Utc>) -> String {
        let since_start = now - self.stream_start;
        if since_start < Duration::seconds(60) {
            "The stream went live in the last minute.".to_string()
        } else {
            format!(
                "The stream last went live: {} ago.",
                human_duration(since_start.num_seconds())
            )
        }
    }
}

/// Whisper the requester unconditionally, copy to the channel when the
/// cooldown allows.
fn respond(message: &ChatMessage, text: String, send_to_channel: bool) -> Vec<OutboundAction> {
    let mut actions = vec![OutboundAction::Whisper {
        user: message.sender().clone(),
        text: text.clone(),
    }];
    if send_to_channel {
        actions.push(OutboundAction::ChannelMessage {
            channel: message.channel().to_string(),
            text,
        });
    }
    actions
}

/// Checks a cooldown clock and, when expired, re-arms it at `now`.
fn ready(clock: &mut Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown_secs: i64) -> bool {
    let expired = clock.map_or(true, |last| (now - last).num_seconds() >= cooldown_secs);
    if expired {
        *clock = Some(now);
    }
    expired
}

/// First weekly occurrence of `anchor` at or after `now`.
fn next_occurrence(anchor: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let behind_ms = now.timestamp_millis() - anchor.timestamp_millis();
    if behind_ms <= 0 {
        return anchor;
    }
    let weeks = (behind_ms + WEEK_MS - 1) / WEEK_MS;
    anchor + Duration::milliseconds(weeks * WEEK_MS)
}

fn utc_instant(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Renders a duration as its non-zero day/hour/minute/second parts,
/// e.g. "1 day, 2 hours, 5 seconds". Sub-second spans render "0 seconds".
pub fn human_duration(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    for (amount, unit) in [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ] {
        if amount > 0 {
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {unit}{plural}"));
        }
    }
    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

// ===== TESTS =====
