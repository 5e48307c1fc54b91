// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "config/env_config.rs"]
pub mod config;

#[path = "filter/word_store.rs"]
pub mod filter;

#[path = "leveling/leveling_store.rs"]
pub mod leveling;

#[path = "moderation/moderation_store.rs"]
pub mod moderation;

pub mod sqlite_pool;
