// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "cooldown/mod.rs"]
pub mod cooldown;

#[path = "filter/mod.rs"]
pub mod filter;

#[path = "leveling/mod.rs"]
pub mod leveling;

#[path = "moderation/mod.rs"]
pub mod moderation;

pub mod notify;
pub mod permissions;
