// Community bot core: leveling, moderation escalation and a word filter.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite, in-memory, env config)
// - `console/` = Line-based frontend (commands, announcements)

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "console/console_layer.rs"]
pub mod console;
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
