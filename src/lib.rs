// chatwarden - the moderation/decision core of a live chat bot.
//
// **Architecture Overview:**
// - `core/`  = Business logic (platform-agnostic)
// - `infra/` = Implementations of core ports (HTTP shortener, broadcaster, stores)
//
// The engine is embedded by a host process: the host feeds inbound chat
// messages in and forwards the returned outbound actions to its transport.
// `src/main.rs` is a small console host that demonstrates the wiring.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
