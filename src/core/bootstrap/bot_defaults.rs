// Boot-time wiring: the seeded name/word lists and the per-channel policy
// overrides read from the settings store.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::policy::RuntimePolicy;

// ===== DEFAULTS DOCUMENT =====

/// Names and words seeded when a channel boots. Loaded from a JSON document
/// so deployments can ship their own lists without rebuilding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotDefaults {
    #[serde(default)]
    pub channel_owners: Vec<String>,
    #[serde(default)]
    pub bot_admins: Vec<String>,
    #[serde(default)]
    pub channel_moderators: Vec<String>,
    #[serde(default)]
    pub blocked_words: Vec<String>,
}

impl BotDefaults {
    /// Reads a defaults document from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read defaults file {}", path.display()))?;
        let defaults = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse defaults file {}", path.display()))?;
        Ok(defaults)
    }

    /// Built-in fallback: no privileged names, plus the stock list of
    /// link-shortener domains blocked to stop URL laundering.
    pub fn builtin() -> Self {
        Self {
            channel_owners: Vec::new(),
            bot_admins: Vec::new(),
            channel_moderators: Vec::new(),
            blocked_words: [
                "strawpoll.me",
                "bit.do",
                "t.co",
                "lnkd.in",
                "db.tt",
                "qr.ae",
                "adf.ly",
                "goo.gl",
                "bitly.com",
                "cur.lv",
                "tinyurl.com",
                "ow.ly",
                "bit.ly",
                "adcrun.ch",
                "ity.im",
                "q.gs",
                "viralurl.com",
                "is.gd",
                "vur.me",
                "bc.vc",
                "twitthis.com",
                "u.to",
                "j.mp",
                "buzurl.com",
                "cutt.us",
                "u.bb",
                "yourls.org",
                "x.co",
                "adcraft.co",
            ]
            .iter()
            .map(|domain| domain.to_string())
            .collect(),
        }
    }
}

// ===== SETTINGS TRAIT (PORT) =====

/// Per-channel settings persistence. Consulted while wiring a channel; the
/// message hot path never touches it.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, channel: &str, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, channel: &str, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Policy variables recognized in the settings store, applied in an order
/// that lets a stored lookback validate against a stored window size.
pub const POLICY_KEYS: [&str; 5] = [
    "maxmsg",
    "linkRepeatCountHost",
    "linkRepeatCountMod",
    "messagesPerSecond",
    "repetitionSearch",
];

/// Applies stored per-channel overrides on top of a base policy. Unreadable,
/// non-numeric, or out-of-range values are logged and skipped so one bad row
/// cannot keep a channel from booting.
pub async fn policy_overrides(
    store: &dyn SettingsStore,
    channel: &str,
    base: RuntimePolicy,
) -> RuntimePolicy {
    let mut policy = base;
    for key in POLICY_KEYS {
        let stored = match store.get(channel, key).await {
            Ok(value) => value,
            Err(err) => {
                warn!("Failed to read setting {} for {}: {}", key, channel, err);
                continue;
            }
        };
        let Some(raw) = stored else {
            continue;
        };
        let Ok(value) = raw.parse::<f64>() else {
            warn!("Ignoring non-numeric setting {}={} for {}", key, raw, channel);
            continue;
        };
        match policy.with_set(key, value) {
            Ok(update) => policy = update.policy,
            Err(err) => warn!("Ignoring stored setting {}={}: {}", key, raw, err),
        }
    }
    policy
}

// ===== TESTS =====
