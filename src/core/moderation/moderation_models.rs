// Moderation domain models - warnings, bans and mutes.
//
// Pure data with no transport dependencies. Frontends turn these into
// whatever their platform calls a ban or a timeout.

use crate::core::leveling::leveling_models::seconds;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One active warning against a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub id: u64,
    pub user_id: u64,
    pub moderator_id: u64,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

/// What the store hands back after recording a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct WarningAdded {
    pub warning: Warning,
    /// Active warnings for the user including the new one.
    pub active_count: u32,
    /// Written in the same commit as the warning when it crossed the limit.
    pub autoban: Option<BanRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub user_id: u64,
    /// `None` when the escalation policy issued the ban.
    pub moderator_id: Option<u64>,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
    /// `None` is a permanent ban.
    pub expires_at: Option<DateTime<Utc>>,
    pub automatic: bool,
}

impl BanRecord {
    pub fn in_force(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteRecord {
    pub user_id: u64,
    pub moderator_id: u64,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MuteRecord {
    pub fn in_force(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// How long a manual ban lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BanLength {
    /// `default_ban_secs` from the config.
    Default,
    For(Duration),
    Permanent,
}

/// Derived from the stored state, never stored itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationState {
    Clear,
    Escalated,
}

/// Result of `ModerationService::warn`.
#[derive(Debug, Clone, PartialEq)]
pub struct WarnOutcome {
    pub warning: Warning,
    pub active_warnings: u32,
    pub max_warnings: u32,
    /// Set only on the warning that crossed the limit.
    pub autoban: Option<BanRecord>,
}

/// Snapshot of everything moderation knows about a user.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationStatus {
    pub user_id: u64,
    pub warnings: Vec<Warning>,
    /// Only a ban still in force at the time of the query.
    pub ban: Option<BanRecord>,
    pub mute: Option<MuteRecord>,
    pub state: EscalationState,
}

/// Tunables for warnings, bans and mutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Warnings that trigger the automatic ban
    pub max_warnings: u32,
    /// Length of the automatic ban in seconds
    pub autoban_secs: u64,
    /// Length of a manual ban when no duration is given
    pub default_ban_secs: u64,
    /// Length of a mute when no duration is given
    pub default_mute_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_warnings: 3,
            autoban_secs: 86_400,
            default_ban_secs: 86_400,
            default_mute_secs: 3_600,
        }
    }
}

impl EscalationConfig {
    pub fn autoban_duration(&self) -> Duration {
        seconds(self.autoban_secs)
    }

    pub fn default_ban_duration(&self) -> Duration {
        seconds(self.default_ban_secs)
    }

    pub fn default_mute_duration(&self) -> Duration {
        seconds(self.default_mute_secs)
    }
}
