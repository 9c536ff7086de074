// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "shortener/http_shortener.rs"]
pub mod shortener;

#[path = "broadcast/message_repeater.rs"]
pub mod broadcast;

#[path = "settings/memory_settings.rs"]
pub mod settings;

#[path = "transport/console_transport.rs"]
pub mod transport;
