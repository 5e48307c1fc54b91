// Moderation service - warnings, automatic escalation, bans and mutes.
//
// NO transport dependencies here. Callers pass ids and timestamps in and get
// plain records back; announcing them is the frontend's job.

use super::escalation::EscalationPolicy;
use super::moderation_models::{
    BanLength, BanRecord, EscalationConfig, EscalationState, ModerationStatus, MuteRecord,
    WarnOutcome, Warning, WarningAdded,
};
use crate::core::cooldown::UserLocks;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for warnings, bans and mutes.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Record a warning, count the user's active warnings and write the
    /// automatic ban when `policy` says the count crossed the limit. Either
    /// all of it commits or none of it does.
    async fn add_warning(
        &self,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        issued_at: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<WarningAdded, ModerationError>;

    async fn get_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError>;

    /// Oldest first.
    async fn active_warnings(&self, user_id: u64) -> Result<Vec<Warning>, ModerationError>;

    /// Remove one warning by id, returning it if it existed.
    async fn remove_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError>;

    /// Remove all of a user's warnings. Returns how many were removed.
    async fn clear_warnings(&self, user_id: u64) -> Result<u32, ModerationError>;

    /// Insert or replace the user's ban.
    async fn set_ban(&self, ban: &BanRecord) -> Result<(), ModerationError>;

    /// The stored ban, expired or not.
    async fn get_ban(&self, user_id: u64) -> Result<Option<BanRecord>, ModerationError>;

    async fn clear_ban(&self, user_id: u64) -> Result<bool, ModerationError>;

    async fn set_mute(&self, mute: &MuteRecord) -> Result<(), ModerationError>;

    async fn get_mute(&self, user_id: u64) -> Result<Option<MuteRecord>, ModerationError>;

    async fn clear_mute(&self, user_id: u64) -> Result<bool, ModerationError>;
}

#[async_trait]
impl<T: ModerationStore + ?Sized> ModerationStore for Box<T> {
    async fn add_warning(
        &self,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        issued_at: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<WarningAdded, ModerationError> {
        (**self)
            .add_warning(user_id, moderator_id, reason, issued_at, policy)
            .await
    }

    async fn get_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        (**self).get_warning(warning_id).await
    }

    async fn active_warnings(&self, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        (**self).active_warnings(user_id).await
    }

    async fn remove_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        (**self).remove_warning(warning_id).await
    }

    async fn clear_warnings(&self, user_id: u64) -> Result<u32, ModerationError> {
        (**self).clear_warnings(user_id).await
    }

    async fn set_ban(&self, ban: &BanRecord) -> Result<(), ModerationError> {
        (**self).set_ban(ban).await
    }

    async fn get_ban(&self, user_id: u64) -> Result<Option<BanRecord>, ModerationError> {
        (**self).get_ban(user_id).await
    }

    async fn clear_ban(&self, user_id: u64) -> Result<bool, ModerationError> {
        (**self).clear_ban(user_id).await
    }

    async fn set_mute(&self, mute: &MuteRecord) -> Result<(), ModerationError> {
        (**self).set_mute(mute).await
    }

    async fn get_mute(&self, user_id: u64) -> Result<Option<MuteRecord>, ModerationError> {
        (**self).get_mute(user_id).await
    }

    async fn clear_mute(&self, user_id: u64) -> Result<bool, ModerationError> {
        (**self).clear_mute(user_id).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S: ModerationStore> {
    store: S,
    config: EscalationConfig,
    policy: EscalationPolicy,
    locks: Arc<UserLocks>,
}

impl<S: ModerationStore> ModerationService<S> {
    pub fn new(store: S, config: EscalationConfig) -> Self {
        Self {
            store,
            policy: EscalationPolicy::from_config(&config),
            config,
            locks: Arc::new(UserLocks::new()),
        }
    }

    /// Share a lock table with other services touching the same users.
    pub fn with_locks(mut self, locks: Arc<UserLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Warn a user and apply the automatic ban if this warning crosses the
    /// limit. A user already past the limit gets the warning but no new ban.
    pub async fn warn(
        &self,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<WarnOutcome, ModerationError> {
        let _guard = self.locks.lock(user_id).await;

        let WarningAdded {
            warning,
            active_count,
            autoban,
        } = self
            .store
            .add_warning(user_id, moderator_id, reason, now, &self.policy)
            .await?;

        tracing::info!(
            user_id,
            moderator_id,
            warning_id = warning.id,
            active_count,
            max_warnings = self.policy.max_warnings,
            "User warned"
        );

        if let Some(ban) = &autoban {
            tracing::info!(
                user_id,
                active_count,
                expires_at = ?ban.expires_at,
                "User automatically banned after reaching the warning limit"
            );
        }

        Ok(WarnOutcome {
            warning,
            active_warnings: active_count,
            max_warnings: self.policy.max_warnings,
            autoban,
        })
    }

    /// Removing a warning never lifts a ban.
    pub async fn remove_warning(
        &self,
        warning_id: u64,
    ) -> Result<Option<Warning>, ModerationError> {
        let Some(warning) = self.store.get_warning(warning_id).await? else {
            return Ok(None);
        };

        let _guard = self.locks.lock(warning.user_id).await;
        let removed = self.store.remove_warning(warning_id).await?;
        if removed.is_some() {
            tracing::info!(user_id = warning.user_id, warning_id, "Warning removed");
        }
        Ok(removed)
    }

    pub async fn clear_warnings(&self, user_id: u64) -> Result<u32, ModerationError> {
        let _guard = self.locks.lock(user_id).await;
        let removed = self.store.clear_warnings(user_id).await?;
        tracing::info!(user_id, removed, "Warnings cleared");
        Ok(removed)
    }

    pub async fn warnings(&self, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        self.store.active_warnings(user_id).await
    }

    pub async fn ban(
        &self,
        user_id: u64,
        moderator_id: u64,
        length: BanLength,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BanRecord, ModerationError> {
        let expires_at = match length {
            BanLength::Default => Some(expiry(now, self.config.default_ban_duration())?),
            BanLength::For(duration) => Some(expiry(now, positive(duration)?)?),
            BanLength::Permanent => None,
        };
        let ban = BanRecord {
            user_id,
            moderator_id: Some(moderator_id),
            reason: reason.to_string(),
            issued_at: now,
            expires_at,
            automatic: false,
        };

        let _guard = self.locks.lock(user_id).await;
        self.store.set_ban(&ban).await?;
        tracing::info!(user_id, moderator_id, ?expires_at, "User banned");
        Ok(ban)
    }

    /// Lift a ban. Returns false if there was none.
    pub async fn unban(&self, user_id: u64) -> Result<bool, ModerationError> {
        let _guard = self.locks.lock(user_id).await;
        let lifted = self.store.clear_ban(user_id).await?;
        if lifted {
            tracing::info!(user_id, "User unbanned");
        }
        Ok(lifted)
    }

    pub async fn mute(
        &self,
        user_id: u64,
        moderator_id: u64,
        duration: Option<Duration>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<MuteRecord, ModerationError> {
        let duration = match duration {
            Some(duration) => positive(duration)?,
            None => self.config.default_mute_duration(),
        };
        let mute = MuteRecord {
            user_id,
            moderator_id,
            reason: reason.to_string(),
            issued_at: now,
            expires_at: expiry(now, duration)?,
        };

        let _guard = self.locks.lock(user_id).await;
        self.store.set_mute(&mute).await?;
        tracing::info!(user_id, moderator_id, expires_at = %mute.expires_at, "User muted");
        Ok(mute)
    }

    pub async fn unmute(&self, user_id: u64) -> Result<bool, ModerationError> {
        let _guard = self.locks.lock(user_id).await;
        let lifted = self.store.clear_mute(user_id).await?;
        if lifted {
            tracing::info!(user_id, "User unmuted");
        }
        Ok(lifted)
    }

    pub async fn is_banned(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, ModerationError> {
        Ok(self
            .store
            .get_ban(user_id)
            .await?
            .is_some_and(|ban| ban.in_force(now)))
    }

    pub async fn is_muted(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, ModerationError> {
        Ok(self
            .store
            .get_mute(user_id)
            .await?
            .is_some_and(|mute| mute.in_force(now)))
    }

    pub async fn status(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ModerationStatus, ModerationError> {
        let warnings = self.store.active_warnings(user_id).await?;
        let ban = self
            .store
            .get_ban(user_id)
            .await?
            .filter(|ban| ban.in_force(now));
        let mute = self
            .store
            .get_mute(user_id)
            .await?
            .filter(|mute| mute.in_force(now));

        let state = if ban.is_some() || warnings.len() as u32 >= self.policy.max_warnings {
            EscalationState::Escalated
        } else {
            EscalationState::Clear
        };

        Ok(ModerationStatus {
            user_id,
            warnings,
            ban,
            mute,
            state,
        })
    }
}

fn positive(duration: Duration) -> Result<Duration, ModerationError> {
    if duration <= Duration::zero() {
        return Err(ModerationError::InvalidDuration(format!(
            "{}s is not a positive duration",
            duration.num_seconds()
        )));
    }
    Ok(duration)
}

fn expiry(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>, ModerationError> {
    now.checked_add_signed(duration).ok_or_else(|| {
        ModerationError::InvalidDuration(format!(
            "{}s is too far in the future",
            duration.num_seconds()
        ))
    })
}

// ============================================================================
// TESTS
// ============================================================================
