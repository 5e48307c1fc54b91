// Shared per-user bookkeeping: cooldown windows and per-user mutual exclusion.
// Used by both the leveling and moderation services.

pub mod cooldown_gate;
pub mod user_locks;

pub use cooldown_gate::CooldownGate;
pub use user_locks::UserLocks;
