// Permission directory - who the bot trusts, and the timeout debt ledger.
//
// Tiers are strictly ordered; every privileged surface asks "at least tier X"
// rather than matching exact tiers, so a ChannelOwner can do everything a
// BotModerator can. Repeat offenders accumulate timeout debt that makes each
// new penalty longer than the last.

use super::chat::ChatUser;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Trust levels, lowest to highest. Ordering is load-bearing: the privilege
/// chain and rule exemption both compare tiers with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionTier {
    Default,
    ChannelModerator,
    BotModerator,
    BotAdmin,
    ChannelOwner,
}

impl PermissionTier {
    /// Moderators and above are never checked against the chat rules.
    pub fn is_rule_exempt(self) -> bool {
        self >= PermissionTier::ChannelModerator
    }

    pub fn name(self) -> &'static str {
        match self {
            PermissionTier::Default => "Default",
            PermissionTier::ChannelModerator => "ChannelModerator",
            PermissionTier::BotModerator => "BotModerator",
            PermissionTier::BotAdmin => "BotAdmin",
            PermissionTier::ChannelOwner => "ChannelOwner",
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown permission tier: {0}")]
pub struct UnknownTier(String);

impl FromStr for PermissionTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(PermissionTier::Default),
            "channelmoderator" => Ok(PermissionTier::ChannelModerator),
            "botmoderator" => Ok(PermissionTier::BotModerator),
            "botadmin" => Ok(PermissionTier::BotAdmin),
            "channelowner" => Ok(PermissionTier::ChannelOwner),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

/// Once base + debt passes this, the surcharge kicks in.
pub const ESCALATION_THRESHOLD: Duration = Duration::from_secs(60);
/// Flat addition applied past the threshold.
pub const ESCALATION_SURCHARGE: Duration = Duration::from_secs(120);

/// The escalation rule: a new violation serves the base duration plus all
/// accumulated debt, and anything past one minute picks up a further fixed
/// two minutes.
pub fn escalated_timeout(base: Duration, debt: Duration) -> Duration {
    let mut total = base + debt;
    if total > ESCALATION_THRESHOLD {
        total += ESCALATION_SURCHARGE;
    }
    total
}

/// Per-user permission tiers and accumulated timeout durations. Absent users
/// are Default with zero debt; nothing here persists across restarts.
#[derive(Default)]
pub struct PermissionDirectory {
    tiers: HashMap<ChatUser, PermissionTier>,
    timeout_debt: HashMap<ChatUser, Duration>,
}

impl PermissionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_permission(&self, user: &ChatUser) -> PermissionTier {
        self.tiers
            .get(user)
            .copied()
            .unwrap_or(PermissionTier::Default)
    }

    /// Overwrite a user's tier. Demotion is just an overwrite with a lower
    /// tier (rmop sets Default).
    pub fn set_permission(&mut self, user: ChatUser, tier: PermissionTier) {
        self.tiers.insert(user, tier);
    }

    pub fn has_at_least(&self, user: &ChatUser, tier: PermissionTier) -> bool {
        self.get_permission(user) >= tier
    }

    pub fn timeout_debt(&self, user: &ChatUser) -> Duration {
        self.timeout_debt.get(user).copied().unwrap_or_default()
    }

    /// Add an issued timeout to the user's debt. Debt only ever grows; there
    /// is no forgiveness path.
    pub fn record_timeout(&mut self, user: &ChatUser, issued: Duration) {
        *self
            .timeout_debt
            .entry(user.clone())
            .or_insert(Duration::ZERO) += issued;
    }
}

// ============================================================================
// TESTS
// ============================================================================
