// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "chat/chat_models.rs"]
pub mod chat;

#[path = "history/message_history.rs"]
pub mod history;

#[path = "permissions/permission_directory.rs"]
pub mod permissions;

#[path = "blacklist/blacklist_engine.rs"]
pub mod blacklist;

#[path = "policy/runtime_policy.rs"]
pub mod policy;

#[path = "commands/command_dispatcher.rs"]
pub mod commands;

#[path = "engine/moderation_engine.rs"]
pub mod engine;

#[path = "bootstrap/bot_defaults.rs"]
pub mod bootstrap;
