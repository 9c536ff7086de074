// This is the entry point of the chatwarden console host.
//
// **Architecture Overview:**
// - `core/`  = Business logic (platform-agnostic)
// - `infra/` = Implementations of core ports (HTTP shortener, broadcaster, stores)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Feed chat lines from stdin through the moderation engine
// 4. Deliver the returned actions through the transport
//
// The engine itself never talks to a chat network. A production host would
// replace `ConsoleTransport` and the stdin loop with a real chat connection
// and keep everything else identical.

use std::sync::Arc;

use chatwarden::core::bootstrap::{policy_overrides, BotDefaults, SettingsStore, POLICY_KEYS};
use chatwarden::core::chat::{route_actions, ChatMessage, ChatUser};
use chatwarden::core::commands::PeriodicBroadcaster;
use chatwarden::core::engine::{ModerationEngine, UrlShortener};
use chatwarden::core::permissions::PermissionTier;
use chatwarden::core::policy::RuntimePolicy;
use chatwarden::infra::broadcast::MessageRepeater;
use chatwarden::infra::settings::MemorySettings;
use chatwarden::infra::shortener::{BitlyShortener, IdentityShortener};
use chatwarden::infra::transport::ConsoleTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from a .env file (if it exists)
    dotenv::dotenv().ok();

    let channel = std::env::var("CHAT_CHANNEL").unwrap_or_else(|_| "lobby".to_string());

    // Seed lists (owners, admins, moderators, blocked words) come from a JSON
    // file when one is configured, otherwise from the compiled-in defaults.
    let defaults = match std::env::var("CHATWARDEN_DEFAULTS") {
        Ok(path) => match BotDefaults::from_json_file(&path) {
            Ok(defaults) => defaults,
            Err(err) => {
                warn!("Failed to load defaults from {}: {:#}", path, err);
                BotDefaults::builtin()
            }
        },
        Err(_) => BotDefaults::builtin(),
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    // Stage per-channel policy overrides from the environment into the
    // settings store, then derive the effective policy from it. A persistent
    // store would be read the same way.
    let settings = MemorySettings::new();
    for key in POLICY_KEYS {
        let env_name = format!("CHATWARDEN_{}", key.to_uppercase());
        if let Ok(raw) = std::env::var(&env_name) {
            if let Err(err) = settings.set(&channel, key, &raw).await {
                warn!("Failed to stage {} override: {}", key, err);
            }
        }
    }
    let policy = policy_overrides(&settings, &channel, RuntimePolicy::default()).await;

    // Links are shortened through Bitly when a token is configured.
    let shortener: Arc<dyn UrlShortener> = match std::env::var("BITLY_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(BitlyShortener::new(token)),
        _ => {
            info!("BITLY_TOKEN not set; links pass through unshortened");
            Arc::new(IdentityShortener)
        }
    };

    let transport = Arc::new(ConsoleTransport);

    // The repeater owns its own timer task; `!bot set messageFrequency` and
    // the `!loop` commands reach it through the engine.
    let repeater = MessageRepeater::new(channel.clone(), transport.clone());
    repeater.start().await;

    let broadcaster: Arc<dyn PeriodicBroadcaster> = repeater.clone();
    let mut engine = ModerationEngine::new(policy, shortener, broadcaster);
    engine.load_defaults(&defaults);
    if let Ok(owner) = std::env::var("CHANNEL_OWNER") {
        if !owner.is_empty() {
            engine.set_permission(ChatUser::new(&owner), PermissionTier::ChannelOwner);
        }
    }

    // ========================================================================
    // CONSOLE LOOP
    // ========================================================================
    // Each stdin line is one chat message: `<user> <message>`. Lines starting
    // with `/` are host-side helpers that never enter the engine.

    println!("chatwarden console host on #{}", channel);
    println!("  <user> <message>       feed one chat line");
    println!("  /tier <user> <tier>    grant a permission tier");
    println!("  /quit                  exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(host_command) = line.strip_prefix('/') {
            if host_command == "quit" {
                break;
            }
            if let Some(grant) = host_command.strip_prefix("tier ") {
                match parse_tier_grant(grant) {
                    Some((user, tier)) => {
                        println!("[host] {} is now {}", user.name(), tier);
                        engine.set_permission(user, tier);
                    }
                    None => eprintln!("usage: /tier <user> <tier>"),
                }
            } else {
                eprintln!("host commands: /tier <user> <tier>, /quit");
            }
            continue;
        }

        let Some((sender, payload)) = line.split_once(' ') else {
            eprintln!("chat lines look like: <user> <message>");
            continue;
        };

        let message = ChatMessage::new(ChatUser::new(sender), channel.clone(), payload);
        let actions = engine.handle_inbound_message(&message).await;
        route_actions(transport.as_ref(), &actions).await;
    }

    info!("chatwarden host shutting down");
}

fn parse_tier_grant(grant: &str) -> Option<(ChatUser, PermissionTier)> {
    let (name, tier) = grant.split_once(' ')?;
    let tier = tier.trim().parse::<PermissionTier>().ok()?;
    Some((ChatUser::new(name), tier))
}
