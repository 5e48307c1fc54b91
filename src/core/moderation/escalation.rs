// Warning escalation policy.
//
// Pure decision logic: given the warning count before and after a new warning,
// decide whether an automatic ban is due. Stores apply it inside the same
// write that records the warning.

use super::moderation_models::{BanRecord, EscalationConfig};
use chrono::{DateTime, Duration, Utc};

pub const AUTOBAN_REASON: &str = "exceeded the warning limit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    pub max_warnings: u32,
    pub autoban_duration: Duration,
}

impl EscalationPolicy {
    pub fn new(max_warnings: u32, autoban_duration: Duration) -> Self {
        Self {
            max_warnings,
            autoban_duration,
        }
    }

    pub fn from_config(config: &EscalationConfig) -> Self {
        Self::new(config.max_warnings, config.autoban_duration())
    }

    /// True when going from `previous` to `current` crosses the limit.
    /// Only the crossing counts; staying at or above it does not.
    pub fn crosses(&self, previous: u32, current: u32) -> bool {
        previous < self.max_warnings && current >= self.max_warnings
    }

    /// Automatic ban for `user_id` if this warning crossed the limit.
    pub fn on_warning_added(
        &self,
        user_id: u64,
        previous: u32,
        current: u32,
        now: DateTime<Utc>,
    ) -> Option<BanRecord> {
        if !self.crosses(previous, current) {
            return None;
        }
        Some(BanRecord {
            user_id,
            moderator_id: None,
            reason: AUTOBAN_REASON.to_string(),
            issued_at: now,
            // Past the end of representable time is as good as permanent.
            expires_at: now.checked_add_signed(self.autoban_duration),
            automatic: true,
        })
    }
}
