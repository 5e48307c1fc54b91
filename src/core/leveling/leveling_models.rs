// Leveling domain models - plain data, no storage or transport concerns.

use super::level_curve::{level_from_experience, BASELINE_LEVEL};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A user's leveling state as kept by the user store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: u64,
    /// Cumulative lifetime experience.
    pub experience: u64,
    /// Always `level_from_experience(experience)` once the core has touched it.
    pub level: u32,
    /// When the user last earned XP from activity. Drives the cooldown.
    pub last_xp_time: Option<DateTime<Utc>>,
    pub xp_multiplier: f64,
    /// After this instant the multiplier counts as 1.0.
    pub multiplier_expires_at: Option<DateTime<Utc>>,
    pub stickers_unlocked: bool,
}

impl UserProgress {
    /// Fresh record for a user seen for the first time.
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            experience: 0,
            level: BASELINE_LEVEL,
            last_xp_time: None,
            xp_multiplier: 1.0,
            multiplier_expires_at: None,
            stickers_unlocked: false,
        }
    }

    /// Multiplier to apply at `now`, honouring expiry.
    pub fn effective_multiplier(&self, now: DateTime<Utc>) -> f64 {
        match self.multiplier_expires_at {
            Some(expires_at) if now >= expires_at => 1.0,
            _ => self.xp_multiplier,
        }
    }

    /// Recompute `level` from `experience`.
    /// Returns the stale level if the stored one was wrong.
    pub fn reconcile_level(&mut self) -> Option<u32> {
        let derived = level_from_experience(self.experience);
        if derived == self.level {
            None
        } else {
            let stale = self.level;
            self.level = derived;
            Some(stale)
        }
    }
}

/// Emitted when an XP change moves a user to a higher level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpEvent {
    pub user_id: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub total_experience: u64,
    /// True only on the level-up that first crosses the sticker unlock level.
    pub stickers_unlocked: bool,
}

/// A successful activity award.
#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    pub amount: u64,
    pub experience: u64,
    pub level: u32,
    pub level_up: Option<LevelUpEvent>,
}

/// Outcome of one activity event.
#[derive(Debug, Clone, PartialEq)]
pub enum AwardResult {
    /// Still inside the cooldown window. Nothing changed.
    Skipped { remaining: Duration },
    Awarded(Award),
}

/// Before/after snapshot of an administrative XP or level edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceChange {
    pub user_id: u64,
    pub old_experience: u64,
    pub new_experience: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub stickers_unlocked: bool,
}

impl ExperienceChange {
    pub fn level_up(&self) -> Option<LevelUpEvent> {
        (self.new_level > self.old_level).then(|| LevelUpEvent {
            user_id: self.user_id,
            old_level: self.old_level,
            new_level: self.new_level,
            total_experience: self.new_experience,
            stickers_unlocked: self.stickers_unlocked,
        })
    }
}

/// Everything a profile view needs, already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub progress: UserProgress,
    pub title: &'static str,
    pub next_title: Option<(&'static str, u32)>,
    pub progress_in_level: u64,
    pub needed_for_next_level: u64,
    pub effective_multiplier: f64,
}

/// Whole seconds as a `Duration`, saturating instead of panicking.
pub(crate) fn seconds(secs: u64) -> Duration {
    Duration::try_seconds(secs.min(i64::MAX as u64) as i64).unwrap_or(Duration::MAX)
}

/// Tunables for the leveling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingConfig {
    /// Inclusive lower bound of the per-message XP roll
    pub xp_min: u64,
    /// Inclusive upper bound of the per-message XP roll
    pub xp_max: u64,
    /// Minimum seconds between two XP-earning messages
    pub cooldown_secs: u64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    /// Highest level an admin may set directly
    pub max_level: u32,
    pub sticker_unlock_level: u32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            xp_min: 5,
            xp_max: 20,
            cooldown_secs: 20,
            min_multiplier: 0.1,
            max_multiplier: 10.0,
            max_level: 100,
            sticker_unlock_level: 25,
        }
    }
}

impl LevelingConfig {
    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_secs)
    }

    pub fn multiplier_in_bounds(&self, multiplier: f64) -> bool {
        multiplier.is_finite()
            && multiplier >= self.min_multiplier
            && multiplier <= self.max_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expired_multiplier_falls_back_to_one() {
        let expiry = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let progress = UserProgress {
            xp_multiplier: 3.0,
            multiplier_expires_at: Some(expiry),
            ..UserProgress::new(1)
        };

        assert_eq!(progress.effective_multiplier(expiry - Duration::seconds(1)), 3.0);
        assert_eq!(progress.effective_multiplier(expiry), 1.0);
    }

    #[test]
    fn test_reconcile_heals_stale_level() {
        let mut progress = UserProgress {
            experience: 300,
            level: 1,
            ..UserProgress::new(1)
        };

        assert_eq!(progress.reconcile_level(), Some(1));
        assert_eq!(progress.level, 3);
        assert_eq!(progress.reconcile_level(), None);
    }

    #[test]
    fn test_multiplier_bounds_are_inclusive() {
        let config = LevelingConfig::default();
        assert!(config.multiplier_in_bounds(0.1));
        assert!(config.multiplier_in_bounds(10.0));
        assert!(!config.multiplier_in_bounds(0.05));
        assert!(!config.multiplier_in_bounds(f64::NAN));
    }
}
