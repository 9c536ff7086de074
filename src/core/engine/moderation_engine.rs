// Moderation engine: the per-channel orchestrator. Every inbound message
// flows through here exactly once: history append, message log, the public
// query commands, then the privilege chain for the sender's tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::blacklist::{self, Blacklist, BlacklistAdd, BlacklistRemove};
use crate::core::bootstrap::BotDefaults;
use crate::core::chat::{ChatMessage, ChatUser, OutboundAction};
use crate::core::commands::{
    is_reserved_command_word, parse_bot_command, BotCommand, CommandDispatcher,
    PeriodicBroadcaster,
};
use crate::core::history::MessageHistory;
use crate::core::permissions::{escalated_timeout, PermissionDirectory, PermissionTier};
use crate::core::policy::RuntimePolicy;

const ASCII_ART_TIMEOUT: Duration = Duration::from_secs(20);
const RATE_TIMEOUT: Duration = Duration::from_secs(20);
const REPETITION_TIMEOUT: Duration = Duration::from_secs(20);
const BLACKLIST_TIMEOUT: Duration = Duration::from_secs(45);

/// Payloads longer than this are eligible for the ASCII-art ratio check.
const ASCII_ART_MIN_LENGTH: usize = 5;
const ASCII_ART_MAX_LEGAL_RATIO: f32 = 0.10;

// ===== SHORTENER TRAIT (PORT) =====

/// URL shortening collaborator. Failures are tolerated; callers fall back
/// to the original URL.
#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> anyhow::Result<String>;
}

// ===== PRIVILEGE CHAIN =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TierHandler {
    HostLinks,
    AdminCommands,
    OperatorCommands,
}

/// Tier-gated handlers, highest requirement first. Every handler whose
/// required tier the sender meets runs for the message; the chain is
/// deliberately non-exclusive so an owner also gets the admin and operator
/// surfaces.
const PRIVILEGE_CHAIN: [(PermissionTier, TierHandler); 3] = [
    (PermissionTier::ChannelOwner, TierHandler::HostLinks),
    (PermissionTier::BotAdmin, TierHandler::AdminCommands),
    (PermissionTier::BotModerator, TierHandler::OperatorCommands),
];

// ===== ENGINE =====

/// Per-channel moderation core. Owns the mutable chat state (history,
/// permissions, blacklist, policy) and turns each inbound message into a
/// list of outbound actions; delivery belongs to the host.
pub struct ModerationEngine {
    history: MessageHistory,
    permissions: PermissionDirectory,
    blacklist: Blacklist,
    dispatcher: CommandDispatcher,
    shortener: Arc<dyn UrlShortener>,
    broadcaster: Arc<dyn PeriodicBroadcaster>,
}

impl ModerationEngine {
    pub fn new(
        policy: RuntimePolicy,
        shortener: Arc<dyn UrlShortener>,
        broadcaster: Arc<dyn PeriodicBroadcaster>,
    ) -> Self {
        let history = MessageHistory::new(policy.max_tracked_messages());
        Self {
            history,
            permissions: PermissionDirectory::new(),
            blacklist: Blacklist::new(),
            dispatcher: CommandDispatcher::new(policy),
            shortener,
            broadcaster,
        }
    }

    /// Seeds the permission directory and blacklist from a defaults
    /// document. Entries the blacklist rejects are logged and skipped.
    pub fn load_defaults(&mut self, defaults: &BotDefaults) {
        for name in &defaults.channel_owners {
            self.permissions
                .set_permission(ChatUser::new(name), PermissionTier::ChannelOwner);
        }
        for name in &defaults.bot_admins {
            self.permissions
                .set_permission(ChatUser::new(name), PermissionTier::BotAdmin);
        }
        for name in &defaults.channel_moderators {
            self.permissions
                .set_permission(ChatUser::new(name), PermissionTier::ChannelModerator);
        }
        for word in &defaults.blocked_words {
            if self.blacklist.add_word(word) != BlacklistAdd::Added {
                warn!("Skipping unusable default blacklist entry: {}", word);
            }
        }
    }

    pub fn set_permission(&mut self, user: ChatUser, tier: PermissionTier) {
        self.permissions.set_permission(user, tier);
    }

    /// Processes one inbound message to completion and returns the outbound
    /// actions in delivery order.
    pub async fn handle_inbound_message(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        self.history.append(message.clone());
        info!(
            target: "message_log",
            "[{}] {}: {}",
            message.channel(),
            message.sender(),
            message.payload()
        );

        let mut actions = Vec::new();
        if message.payload().starts_with('!') {
            actions.extend(self.dispatcher.user_command(message));
        }

        let tier = self.permissions.get_permission(message.sender());
        for (required, handler) in PRIVILEGE_CHAIN {
            if tier < required {
                continue;
            }
            match handler {
                TierHandler::HostLinks => actions.extend(self.host_links(message).await),
                TierHandler::AdminCommands => actions.extend(self.admin_command(message).await),
                TierHandler::OperatorCommands => {
                    actions.extend(self.operator_command(message).await)
                }
            }
        }
        if tier == PermissionTier::Default {
            actions.extend(self.enforce(message));
        }
        actions
    }

    /// Channel-owner links are shortened, cached for `!lll`, and repeated
    /// into the channel.
    async fn host_links(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        let payload = message.payload();
        if !is_link(payload) {
            return Vec::new();
        }
        let link = self.shorten_or_original(payload).await;
        self.dispatcher.record_host_link(link.clone());
        repeat_link(
            &link,
            message.channel(),
            message.sender().name(),
            self.dispatcher.policy().link_repeat_count_host(),
        )
    }

    /// Operator tools: `!link` repetition and the `!loop` broadcast list.
    async fn operator_command(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        let payload = message.payload();
        if let Some(target) = payload.strip_prefix("!link ") {
            let link = if is_link(target) {
                self.shorten_or_original(target).await
            } else {
                target.to_string()
            };
            return repeat_link(
                &link,
                message.channel(),
                message.sender().name(),
                self.dispatcher.policy().link_repeat_count_mod(),
            );
        }
        if let Some(text) = payload.strip_prefix("!loop add ") {
            let ack = self.broadcaster.add_message(text).await;
            return vec![channel_message(message.channel(), ack)];
        }
        if payload.starts_with("!loop removeLast") {
            let ack = self.broadcaster.clear_last().await;
            return vec![channel_message(message.channel(), ack)];
        }
        if payload.starts_with("!loop removeAll") {
            let ack = self.broadcaster.clear_all().await;
            return vec![channel_message(message.channel(), ack)];
        }
        Vec::new()
    }

    /// Executes a `!bot` command. Retroactive blacklist timeouts come before
    /// the acknowledgment so the ack reads as a summary of what happened.
    async fn admin_command(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        let Some(command) = parse_bot_command(message.payload()) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        let ack = match command {
            BotCommand::BlacklistWord(word) => match self.blacklist.add_word(&word) {
                BlacklistAdd::Added => {
                    actions.extend(self.retro_word_timeouts(&word, message.channel()));
                    format!("{word} added to the blacklist.")
                }
                BlacklistAdd::TooShort => "Word not long enough.".to_string(),
                BlacklistAdd::Duplicate => format!("{word} already on blacklist."),
            },
            BotCommand::UnblacklistWord(word) => match self.blacklist.remove_word(&word) {
                BlacklistRemove::Removed => format!("{word} removed from the blacklist."),
                BlacklistRemove::NotFound => format!("{word} not found on the blacklist"),
            },
            BotCommand::BlacklistMessage(text) => match self.blacklist.add_message(&text) {
                BlacklistAdd::Added => {
                    actions.extend(self.retro_message_timeouts(&text, message.channel()));
                    format!(
                        "{text} added to the message blacklist. \
                         Previous messages breaching this rule will be timed out."
                    )
                }
                _ => format!("{text} already on blacklist."),
            },
            BotCommand::UnblacklistMessage(text) => match self.blacklist.remove_message(&text) {
                BlacklistRemove::Removed => format!("{text} removed from the blacklist."),
                BlacklistRemove::NotFound => format!("{text} not found on the blacklist"),
            },
            BotCommand::PromoteOperator { tier, name } => {
                self.permissions.set_permission(ChatUser::new(&name), tier);
                format!("Added {name} to {tier}")
            }
            BotCommand::DemoteOperator(name) => {
                self.permissions
                    .set_permission(ChatUser::new(&name), PermissionTier::Default);
                format!("{name} is no longer an operator.")
            }
            BotCommand::ResetStreamStart => self.dispatcher.reset_stream_start(message.timestamp()),
            BotCommand::Set { variable, value } => {
                let ack = self
                    .dispatcher
                    .apply_set(&variable, &value, self.broadcaster.as_ref())
                    .await;
                // maxmsg may have resized the tracking window.
                self.history
                    .set_capacity(self.dispatcher.policy().max_tracked_messages());
                ack
            }
            BotCommand::Unknown => "Unknown Command Entered.".to_string(),
            BotCommand::Malformed => "Syntax Error.".to_string(),
        };
        actions.push(channel_message(message.channel(), ack));
        actions
    }

    fn retro_word_timeouts(&mut self, word: &str, channel: &str) -> Vec<OutboundAction> {
        let snapshot = self.history.snapshot();
        let permissions = &self.permissions;
        let offenders: Vec<ChatUser> = blacklist::word_offenders(&snapshot, word, |user| {
            permissions.has_at_least(user, PermissionTier::ChannelModerator)
        })
        .into_iter()
        .map(|message| message.sender().clone())
        .collect();

        let mut actions = Vec::new();
        for user in offenders {
            actions.extend(self.timeout_user(
                &user,
                channel,
                BLACKLIST_TIMEOUT,
                "A word you have recently used has been blacklisted",
            ));
        }
        actions
    }

    fn retro_message_timeouts(&mut self, text: &str, channel: &str) -> Vec<OutboundAction> {
        let snapshot = self.history.snapshot();
        let permissions = &self.permissions;
        let offenders: Vec<ChatUser> = blacklist::message_offenders(&snapshot, text, |user| {
            permissions.has_at_least(user, PermissionTier::ChannelModerator)
        })
        .into_iter()
        .map(|message| message.sender().clone())
        .collect();

        let mut actions = Vec::new();
        for user in offenders {
            actions.extend(self.timeout_user(
                &user,
                channel,
                BLACKLIST_TIMEOUT,
                "A message you recently sent has been blacklisted",
            ));
        }
        actions
    }

    /// Default-tier enforcement. Guard order is load-bearing: the rate guard
    /// short-circuits everything after it for the offending message.
    fn enforce(&mut self, message: &ChatMessage) -> Vec<OutboundAction> {
        let policy = self.dispatcher.policy().clone();
        let mut actions = Vec::new();

        if message.payload().chars().count() > ASCII_ART_MIN_LENGTH
            && message.legal_char_ratio(policy.permitted_chars()) < ASCII_ART_MAX_LEGAL_RATIO
        {
            actions.extend(self.timeout_user(
                message.sender(),
                message.channel(),
                ASCII_ART_TIMEOUT,
                "You have been timed out for posting ASCII art.",
            ));
        }

        let snapshot = self.history.snapshot();
        let user_messages = snapshot.for_user(message.sender());
        let message_count = user_messages.len();
        let span_secs = user_messages.time_span().as_secs();
        if message_count > 2
            && message_count as f32 / span_secs as f32 > policy.messages_per_second()
        {
            actions.extend(self.timeout_user(
                message.sender(),
                message.channel(),
                RATE_TIMEOUT,
                "You have been timed out for posting messages too quickly.",
            ));
            return actions;
        }

        let simple = message.simple_payload();
        if self.blacklist.contains_blocked_word(message.payload())
            || self.blacklist.is_blocked_message(&simple)
        {
            actions.extend(self.timeout_user(
                message.sender(),
                message.channel(),
                BLACKLIST_TIMEOUT,
                "You posted a blacklisted word.",
            ));
        }

        // Query commands repeat naturally; they never count as spam.
        if is_reserved_command_word(message.payload()) {
            return actions;
        }

        // The just-appended message matches itself, so counts exclude it.
        let channel_count = snapshot.count_simple_payload(&simple).saturating_sub(1);
        if channel_count >= policy.repetition_search() {
            actions.extend(self.timeout_user(
                message.sender(),
                message.channel(),
                REPETITION_TIMEOUT,
                "You have been timed out. Your message has been posted in the chat recently.",
            ));
        } else if user_messages.count_simple_payload(&simple).saturating_sub(1) >= 2 {
            actions.extend(self.timeout_user(
                message.sender(),
                message.channel(),
                REPETITION_TIMEOUT,
                "You have been timed out for repeating the same message.",
            ));
        }
        actions
    }

    /// Issues an escalated timeout: whisper the reason, emit the timeout,
    /// and record the issued duration against the user's running debt.
    fn timeout_user(
        &mut self,
        user: &ChatUser,
        channel: &str,
        base: Duration,
        reason: &str,
    ) -> Vec<OutboundAction> {
        let debt = self.permissions.timeout_debt(user);
        let issued = escalated_timeout(base, debt);
        self.permissions.record_timeout(user, issued);
        info!(
            target: "action_log",
            "Timeout {} for {}s. Reason: {}",
            user,
            issued.as_secs(),
            reason
        );
        vec![
            OutboundAction::Whisper {
                user: user.clone(),
                text: reason.to_string(),
            },
            OutboundAction::Timeout {
                channel: channel.to_string(),
                user: user.clone(),
                duration: issued,
                reason: reason.to_string(),
            },
        ]
    }

    async fn shorten_or_original(&self, url: &str) -> String {
        match self.shortener.shorten(url).await {
            Ok(short) => short,
            Err(err) => {
                warn!("Failed to shorten link {}: {}", url, err);
                url.to_string()
            }
        }
    }
}

fn is_link(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// "{sender} : {url}" repeated `count` times into the channel.
fn repeat_link(url: &str, channel: &str, sender: &str, count: u32) -> Vec<OutboundAction> {
    let text = format!("{sender} : {url}");
    (0..count)
        .map(|_| OutboundAction::ChannelMessage {
            channel: channel.to_string(),
            text: text.clone(),
        })
        .collect()
}

fn channel_message(channel: &str, text: String) -> OutboundAction {
    OutboundAction::ChannelMessage {
        channel: channel.to_string(),
        text,
    }
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    struct MockShortener {
        response: Option<String>,
    }

    #[async_trait]
    impl UrlShortener for MockShortener {
        async fn shorten(&self, url: &str) -> anyhow::Result<String> {
            match &self.response {
                Some(short) => Ok(short.clone()),
                None => Err(anyhow::anyhow!("shortener offline: {url}")),
            }
        }
    }

    #[derive(Default)]
    struct RecordingBroadcaster {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PeriodicBroadcaster for RecordingBroadcaster {
        async fn start(&self) {
            self.calls.lock().unwrap().push("start".to_string());
        }

        async fn set_frequency(&self, seconds: u32) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("set_frequency {seconds}"));
        }

        async fn toggle_enabled(&self) {
            self.calls.lock().unwrap().push("toggle".to_string());
        }

        async fn add_message(&self, text: &str) -> String {
            self.calls.lock().unwrap().push(format!("add {text}"));
            format!("Added message: {text}")
        }

        async fn clear_last(&self) -> String {
            "Last message removed.".to_string()
        }

        async fn clear_all(&self) -> String {
            "All messages removed.".to_string()
        }
    }

    fn engine() -> ModerationEngine {
        engine_with_shortener(Some("http://short.ly/x"))
    }

    fn engine_with_shortener(response: Option<&str>) -> ModerationEngine {
        ModerationEngine::new(
            RuntimePolicy::default(),
            Arc::new(MockShortener {
                response: response.map(str::to_string),
            }),
            Arc::new(RecordingBroadcaster::default()),
        )
    }

    // One day past the default show anchor, so `!ttl` stays quiet and the
    // spam scenarios see no extra command responses.
    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_457_742_600 + 86_400, 0).unwrap()
    }

    fn msg(sender: &str, payload: &str, secs: i64) -> ChatMessage {
        ChatMessage::at(
            ChatUser::new(sender),
            "testchannel",
            payload,
            base() + chrono::Duration::seconds(secs),
        )
    }

    fn summaries(actions: &[OutboundAction]) -> Vec<String> {
        actions
            .iter()
            .map(|action| match action {
                OutboundAction::ChannelMessage { text, .. } => format!("channel:{text}"),
                OutboundAction::Whisper { user, text } => {
                    format!("whisper[{}]:{}", user.name(), text)
                }
                OutboundAction::Timeout { user, duration, .. } => {
                    format!("timeout[{}]:{}s", user.name(), duration.as_secs())
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn ordinary_messages_produce_no_actions() {
        let mut engine = engine();
        let actions = engine
            .handle_inbound_message(&msg("viewer", "hello world", 0))
            .await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn ascii_art_is_timed_out_with_a_whispered_reason() {
        let mut engine = engine();
        let actions = engine
            .handle_inbound_message(&msg("artist", "░░░░░░░░░░", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[artist]:You have been timed out for posting ASCII art.".to_string(),
                "timeout[artist]:20s".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn rapid_identical_messages_hit_the_rate_guard_not_repetition() {
        let mut engine = engine();
        assert!(engine
            .handle_inbound_message(&msg("spammer", "hello", 0))
            .await
            .is_empty());
        assert!(engine
            .handle_inbound_message(&msg("spammer", "hello", 0))
            .await
            .is_empty());

        // Third message within one second: 3 messages / 1s > 2.5.
        let actions = engine
            .handle_inbound_message(&msg("spammer", "hello", 1))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[spammer]:You have been timed out for posting messages too quickly."
                    .to_string(),
                "timeout[spammer]:20s".to_string(),
            ]
        );

        // Fourth: still rate-limited, now with 20s of debt rolled in.
        let actions = engine
            .handle_inbound_message(&msg("spammer", "hello", 1))
            .await;
        assert_eq!(summaries(&actions)[1], "timeout[spammer]:40s");
    }

    #[tokio::test]
    async fn repeating_a_message_three_times_is_timed_out() {
        let mut engine = engine();
        for secs in [0, 60] {
            assert!(engine
                .handle_inbound_message(&msg("parrot", "hi there", secs))
                .await
                .is_empty());
        }
        let actions = engine
            .handle_inbound_message(&msg("parrot", "hi there", 120))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[parrot]:You have been timed out for repeating the same message."
                    .to_string(),
                "timeout[parrot]:20s".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn channel_wide_repetition_catches_the_fifth_echo() {
        let mut engine = engine();
        for (i, sender) in ["a", "b", "c", "d"].iter().enumerate() {
            let actions = engine
                .handle_inbound_message(&msg(sender, "buy gold", i as i64 * 60))
                .await;
            assert!(actions.is_empty(), "no timeout expected for {sender}");
        }
        let actions = engine
            .handle_inbound_message(&msg("e", "Buy Gold", 300))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[e]:You have been timed out. Your message has been posted in the chat recently."
                    .to_string(),
                "timeout[e]:20s".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn reserved_command_words_never_count_as_repetition() {
        let mut engine = engine();
        for secs in [0, 60, 120, 180] {
            let actions = engine
                .handle_inbound_message(&msg("curious", "!ttl", secs))
                .await;
            assert!(actions.is_empty());
        }
    }

    #[tokio::test]
    async fn blacklisted_words_time_out_live_posters() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);
        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot blw frog", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:frog added to the blacklist.".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("viewer", "I love FROGS", 60))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[viewer]:You posted a blacklisted word.".to_string(),
                "timeout[viewer]:45s".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn escalation_adds_the_surcharge_past_the_minute_mark() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);
        engine
            .handle_inbound_message(&msg("admin", "!bot blw frog", 0))
            .await;

        let first = engine
            .handle_inbound_message(&msg("viewer", "frog one", 60))
            .await;
        assert_eq!(summaries(&first)[1], "timeout[viewer]:45s");

        // 45s base + 45s debt crosses sixty seconds: surcharge applies.
        let second = engine
            .handle_inbound_message(&msg("viewer", "frog two", 180))
            .await;
        assert_eq!(summaries(&second)[1], "timeout[viewer]:210s");
    }

    #[tokio::test]
    async fn blacklisting_a_word_times_out_past_offenders_before_the_ack() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);
        engine.set_permission(ChatUser::new("mod_user"), PermissionTier::ChannelModerator);

        engine
            .handle_inbound_message(&msg("alice", "frogs are great", 0))
            .await;
        engine
            .handle_inbound_message(&msg("bob", "nothing to see here", 10))
            .await;
        engine
            .handle_inbound_message(&msg("mod_user", "FROG talk is fine for mods", 20))
            .await;

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot blw frog", 30))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[alice]:A word you have recently used has been blacklisted".to_string(),
                "timeout[alice]:45s".to_string(),
                "channel:frog added to the blacklist.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn blacklisting_a_message_matches_exact_payloads_only() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);

        engine
            .handle_inbound_message(&msg("alice", "Buy My Stuff ", 0))
            .await;
        engine
            .handle_inbound_message(&msg("bob", "please buy my stuff", 10))
            .await;

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot blm buy my stuff", 20))
            .await;
        assert_eq!(
            summaries(&actions),
            vec![
                "whisper[alice]:A message you recently sent has been blacklisted".to_string(),
                "timeout[alice]:45s".to_string(),
                "channel:buy my stuff added to the message blacklist. Previous messages breaching this rule will be timed out."
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn moderators_are_exempt_from_enforcement() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("mod_user"), PermissionTier::ChannelModerator);
        let actions = engine
            .handle_inbound_message(&msg("mod_user", "░░░░░░░░░░", 0))
            .await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn owner_links_are_shortened_repeated_and_cached() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("owner"), PermissionTier::ChannelOwner);

        let actions = engine
            .handle_inbound_message(&msg("owner", "https://example.com/page", 0))
            .await;
        assert_eq!(actions.len(), 7);
        assert_eq!(
            summaries(&actions)[0],
            "channel:owner : http://short.ly/x"
        );

        let actions = engine
            .handle_inbound_message(&msg("viewer", "!lll", 10))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "whisper[viewer]:Last link posted by the host: http://short.ly/x"
        );
    }

    #[tokio::test]
    async fn shortener_failures_fall_back_to_the_original_url() {
        let mut engine = engine_with_shortener(None);
        engine.set_permission(ChatUser::new("owner"), PermissionTier::ChannelOwner);

        let actions = engine
            .handle_inbound_message(&msg("owner", "https://example.com/page", 0))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "channel:owner : https://example.com/page"
        );

        let actions = engine
            .handle_inbound_message(&msg("viewer", "!lll", 10))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "whisper[viewer]:Last link posted by the host: https://example.com/page"
        );
    }

    #[tokio::test]
    async fn operators_repeat_links_and_manage_the_broadcast_loop() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("op"), PermissionTier::BotModerator);

        let actions = engine
            .handle_inbound_message(&msg("op", "!link https://example.com", 0))
            .await;
        assert_eq!(actions.len(), 5);
        assert_eq!(summaries(&actions)[0], "channel:op : http://short.ly/x");

        let actions = engine
            .handle_inbound_message(&msg("op", "!loop add welcome to the stream", 10))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Added message: welcome to the stream".to_string()]
        );
    }

    #[tokio::test]
    async fn operator_links_are_not_cached_for_lll() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("op"), PermissionTier::BotModerator);
        engine
            .handle_inbound_message(&msg("op", "!link https://example.com", 0))
            .await;

        let actions = engine
            .handle_inbound_message(&msg("viewer", "!lll", 10))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "whisper[viewer]:The host has not posted a link recently."
        );
    }

    #[tokio::test]
    async fn promotion_takes_effect_and_demotion_revokes_it() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot addop BotModerator kate", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Added kate to BotModerator".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("kate", "!link hello", 10))
            .await;
        assert_eq!(actions.len(), 5);

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot rmop kate", 20))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:kate is no longer an operator.".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("kate", "just chatting now", 30))
            .await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn owners_fall_through_to_the_admin_surface() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("owner"), PermissionTier::ChannelOwner);

        engine
            .handle_inbound_message(&msg("owner", "frog soup recipe", 0))
            .await;
        let actions = engine
            .handle_inbound_message(&msg("owner", "!bot blw frog", 10))
            .await;
        // The owner's own earlier message is exempt from the retroactive
        // scan, so the only action is the acknowledgment.
        assert_eq!(
            summaries(&actions),
            vec!["channel:frog added to the blacklist.".to_string()]
        );
    }

    #[tokio::test]
    async fn bot_commands_are_ignored_below_admin_tier() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("mod_user"), PermissionTier::ChannelModerator);
        let actions = engine
            .handle_inbound_message(&msg("mod_user", "!bot blw frog", 0))
            .await;
        assert!(actions.is_empty());

        let actions = engine
            .handle_inbound_message(&msg("viewer", "!bot blw frog", 10))
            .await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_malformed_bot_commands_answer_in_channel() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot dance", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Unknown Command Entered.".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot blw ab", 10))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Word not long enough.".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot blw", 20))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Syntax Error.".to_string()]
        );
    }

    #[tokio::test]
    async fn set_maxmsg_resizes_history_and_clamps_the_lookback() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot set maxmsg 3", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:maxmsg set to 3".to_string()]
        );

        // With the window at 3 and the lookback clamped to 2, the third
        // identical payload trips the channel-wide guard.
        for secs in [60, 120] {
            assert!(engine
                .handle_inbound_message(&msg("viewer", "dup", secs))
                .await
                .is_empty());
        }
        let actions = engine
            .handle_inbound_message(&msg("viewer", "dup", 180))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "whisper[viewer]:You have been timed out. Your message has been posted in the chat recently."
        );
    }

    #[tokio::test]
    async fn sstart_marks_the_stream_live_for_uptime() {
        let mut engine = engine();
        engine.set_permission(ChatUser::new("admin"), PermissionTier::BotAdmin);

        let actions = engine
            .handle_inbound_message(&msg("admin", "!bot sstart", 0))
            .await;
        assert_eq!(
            summaries(&actions),
            vec!["channel:Stream start time has been set.".to_string()]
        );

        let actions = engine
            .handle_inbound_message(&msg("viewer", "!uptime", 30))
            .await;
        assert_eq!(
            summaries(&actions)[0],
            "whisper[viewer]:The stream went live in the last minute."
        );
    }

    #[tokio::test]
    async fn defaults_seed_permissions_and_blacklist() {
        let mut engine = engine();
        let defaults = BotDefaults {
            channel_owners: vec!["owner".to_string()],
            bot_admins: vec!["admin".to_string()],
            channel_moderators: vec!["mod_user".to_string()],
            blocked_words: vec!["bit.ly".to_string(), "xy".to_string()],
        };
        engine.load_defaults(&defaults);

        // The moderator is exempt from enforcement.
        let actions = engine
            .handle_inbound_message(&msg("mod_user", "check bit.ly/abc", 0))
            .await;
        assert!(actions.is_empty());

        // A default-tier user posting a seeded domain is timed out; the
        // too-short entry was skipped rather than loaded.
        let actions = engine
            .handle_inbound_message(&msg("viewer", "go to bit.ly/abc", 10))
            .await;
        assert_eq!(summaries(&actions)[1], "timeout[viewer]:45s");
        let actions = engine
            .handle_inbound_message(&msg("viewer2", "xy", 20))
            .await;
        assert!(actions.is_empty());
    }
}
