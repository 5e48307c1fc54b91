// Leveling service - the business logic for experience and levels.
// No transport code here: it works with primitive ids and timestamps so any
// frontend (chat bot, console, web) can drive it.

use super::level_curve::{
    level_from_experience, needed_for_next_level, progress_in_level, required_experience,
    BASELINE_LEVEL,
};
use super::leveling_models::{
    Award, AwardResult, ExperienceChange, LevelUpEvent, LevelingConfig, Profile, UserProgress,
};
use super::titles::{next_title, title_for_level};
use crate::core::cooldown::{CooldownGate, UserLocks};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Multiplier {requested} is outside the allowed range {min}..={max}")]
    InvalidMultiplier { requested: f64, min: f64, max: f64 },

    #[error("Level {requested} is outside the allowed range 0..={max}")]
    InvalidLevelTarget { requested: i64, max: u32 },

    #[error("Unknown user {0}")]
    UnknownUser(u64),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for leveling state. Each call must be atomic on its own; the
/// service takes care of ordering calls for the same user.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `None` if the user has never been seen.
    async fn get_progress(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError>;

    /// Insert or fully replace a user's record.
    async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), LevelingError>;

    /// Users ordered by experience, highest first.
    async fn top_by_experience(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UserProgress>, LevelingError>;
}

/// Lets the composition root pick a store at runtime.
#[async_trait]
impl<T: UserStore + ?Sized> UserStore for Box<T> {
    async fn get_progress(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError> {
        (**self).get_progress(user_id).await
    }

    async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), LevelingError> {
        (**self).upsert_progress(progress).await
    }

    async fn top_by_experience(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UserProgress>, LevelingError> {
        (**self).top_by_experience(limit, offset).await
    }
}

// ============================================================================
// XP ROLL
// ============================================================================

/// Source of the base XP for one message.
pub trait XpRoll: Send + Sync {
    /// Uniform draw from `min..=max`.
    fn roll(&self, min: u64, max: u64) -> u64;
}

pub struct ThreadRngRoll;

impl XpRoll for ThreadRngRoll {
    fn roll(&self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// `floor(base × multiplier)`, never negative.
pub fn scaled_award(base: u64, multiplier: f64) -> u64 {
    let scaled = (base as f64 * multiplier).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled.min(u64::MAX as f64) as u64
    } else {
        0
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct LevelingService<S: UserStore, R: XpRoll = ThreadRngRoll> {
    store: S,
    roll: R,
    config: LevelingConfig,
    cooldown: CooldownGate,
    locks: Arc<UserLocks>,
}

impl<S: UserStore> LevelingService<S> {
    pub fn new(store: S, config: LevelingConfig) -> Self {
        Self::with_roll(store, config, ThreadRngRoll)
    }
}

impl<S: UserStore, R: XpRoll> LevelingService<S, R> {
    pub fn with_roll(store: S, config: LevelingConfig, roll: R) -> Self {
        Self {
            store,
            roll,
            cooldown: CooldownGate::new(config.cooldown()),
            config,
            locks: Arc::new(UserLocks::new()),
        }
    }

    /// Share a lock table with other services touching the same users.
    pub fn with_locks(mut self, locks: Arc<UserLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &LevelingConfig {
        &self.config
    }

    pub fn cooldown_gate(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// Read a user and heal a level that disagrees with its experience.
    async fn load(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError> {
        let Some(mut progress) = self.store.get_progress(user_id).await? else {
            return Ok(None);
        };
        if let Some(stale_level) = progress.reconcile_level() {
            tracing::warn!(
                user_id,
                stale_level,
                level = progress.level,
                experience = progress.experience,
                "Stored level disagreed with experience; recomputed"
            );
        }
        Ok(Some(progress))
    }

    async fn load_existing(&self, user_id: u64) -> Result<UserProgress, LevelingError> {
        self.load(user_id)
            .await?
            .ok_or(LevelingError::UnknownUser(user_id))
    }

    /// Flip one-time perks earned at the current level. Returns true if
    /// anything was unlocked by this call.
    fn unlock_perks(&self, progress: &mut UserProgress) -> bool {
        if !progress.stickers_unlocked && progress.level >= self.config.sticker_unlock_level {
            progress.stickers_unlocked = true;
            true
        } else {
            false
        }
    }

    /// Handle one activity event (a chat message) for `user_id` at `now`.
    ///
    /// Inside the cooldown window nothing is read or written beyond the gate
    /// check. Otherwise a base amount is rolled, scaled by the user's
    /// multiplier, and experience, level and `last_xp_time` are committed in a
    /// single upsert.
    pub async fn on_activity(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AwardResult, LevelingError> {
        if let Some(remaining) = self.cooldown.check_cached(user_id, now) {
            tracing::debug!(user_id, remaining_secs = remaining.num_seconds(), "XP on cooldown");
            return Ok(AwardResult::Skipped { remaining });
        }

        let _guard = self.locks.lock(user_id).await;

        let mut progress = self
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id));

        if let Some(remaining) = self.cooldown.remaining(progress.last_xp_time, now) {
            if let Some(last) = progress.last_xp_time {
                self.cooldown.record(user_id, last);
            }
            tracing::debug!(user_id, remaining_secs = remaining.num_seconds(), "XP on cooldown");
            return Ok(AwardResult::Skipped { remaining });
        }

        let base = self.roll.roll(self.config.xp_min, self.config.xp_max);
        let multiplier = progress.effective_multiplier(now);
        let amount = scaled_award(base, multiplier);

        let old_level = progress.level;
        progress.experience = progress.experience.saturating_add(amount);
        progress.level = level_from_experience(progress.experience);
        progress.last_xp_time = Some(now);
        let stickers_unlocked = self.unlock_perks(&mut progress);

        self.store.upsert_progress(&progress).await?;
        self.cooldown.record(user_id, now);

        tracing::debug!(
            user_id,
            base,
            multiplier,
            amount,
            experience = progress.experience,
            "Awarded XP"
        );

        let level_up = (progress.level > old_level).then(|| LevelUpEvent {
            user_id,
            old_level,
            new_level: progress.level,
            total_experience: progress.experience,
            stickers_unlocked,
        });
        if let Some(event) = &level_up {
            tracing::info!(
                user_id,
                old_level = event.old_level,
                new_level = event.new_level,
                total_experience = event.total_experience,
                "User leveled up"
            );
        }

        Ok(AwardResult::Awarded(Award {
            amount,
            experience: progress.experience,
            level: progress.level,
            level_up,
        }))
    }

    /// Add (or with a negative delta, remove) experience as an admin.
    /// Experience never goes below zero; the level follows in either direction.
    pub async fn modify_experience(
        &self,
        user_id: u64,
        delta: i64,
    ) -> Result<ExperienceChange, LevelingError> {
        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load_existing(user_id).await?;

        let old_experience = progress.experience;
        let old_level = progress.level;
        progress.experience = if delta >= 0 {
            old_experience.saturating_add(delta as u64)
        } else {
            old_experience.saturating_sub(delta.unsigned_abs())
        };
        progress.level = level_from_experience(progress.experience);
        let stickers_unlocked = self.unlock_perks(&mut progress);

        self.store.upsert_progress(&progress).await?;

        tracing::info!(
            user_id,
            delta,
            old_experience,
            new_experience = progress.experience,
            "Experience modified"
        );

        Ok(ExperienceChange {
            user_id,
            old_experience,
            new_experience: progress.experience,
            old_level,
            new_level: progress.level,
            stickers_unlocked,
        })
    }

    /// Put a user exactly at the start of `target` level.
    pub async fn set_level(
        &self,
        user_id: u64,
        target: i64,
    ) -> Result<ExperienceChange, LevelingError> {
        if target < BASELINE_LEVEL as i64 || target > self.config.max_level as i64 {
            return Err(LevelingError::InvalidLevelTarget {
                requested: target,
                max: self.config.max_level,
            });
        }
        let target = target as u32;

        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load_existing(user_id).await?;

        let old_experience = progress.experience;
        let old_level = progress.level;
        progress.experience = required_experience(target);
        progress.level = target;
        let stickers_unlocked = self.unlock_perks(&mut progress);

        self.store.upsert_progress(&progress).await?;

        tracing::info!(user_id, old_level, new_level = target, "Level set");

        Ok(ExperienceChange {
            user_id,
            old_experience,
            new_experience: progress.experience,
            old_level,
            new_level: target,
            stickers_unlocked,
        })
    }

    /// Change a user's XP multiplier, optionally until `expires_at`.
    pub async fn set_multiplier(
        &self,
        user_id: u64,
        multiplier: f64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), LevelingError> {
        if !self.config.multiplier_in_bounds(multiplier) {
            return Err(LevelingError::InvalidMultiplier {
                requested: multiplier,
                min: self.config.min_multiplier,
                max: self.config.max_multiplier,
            });
        }

        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load_existing(user_id).await?;
        progress.xp_multiplier = multiplier;
        progress.multiplier_expires_at = expires_at;
        self.store.upsert_progress(&progress).await?;

        tracing::info!(user_id, multiplier, ?expires_at, "XP multiplier set");
        Ok(())
    }

    pub async fn profile(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Profile, LevelingError> {
        let progress = self.load_existing(user_id).await?;
        Ok(Profile {
            title: title_for_level(progress.level),
            next_title: next_title(progress.level),
            progress_in_level: progress_in_level(progress.experience, progress.level),
            needed_for_next_level: needed_for_next_level(progress.experience, progress.level),
            effective_multiplier: progress.effective_multiplier(now),
            progress,
        })
    }

    pub async fn leaderboard(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UserProgress>, LevelingError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut users = self.store.top_by_experience(limit, offset).await?;
        for user in &mut users {
            user.reconcile_level();
        }
        Ok(users)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use dashmap::DashMap;

    struct MockUserStore {
        users: DashMap<u64, UserProgress>,
    }

    impl MockUserStore {
        fn new() -> Self {
            Self {
                users: DashMap::new(),
            }
        }

        fn with(users: Vec<UserProgress>) -> Self {
            let store = Self::new();
            for user in users {
                store.users.insert(user.user_id, user);
            }
            store
        }
    }

    #[async_trait]
    impl UserStore for MockUserStore {
        async fn get_progress(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError> {
            Ok(self.users.get(&user_id).map(|u| u.clone()))
        }

        async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), LevelingError> {
            self.users.insert(progress.user_id, progress.clone());
            Ok(())
        }

        async fn top_by_experience(
            &self,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<UserProgress>, LevelingError> {
            let mut users: Vec<_> = self.users.iter().map(|u| u.clone()).collect();
            users.sort_by(|a, b| b.experience.cmp(&a.experience));
            Ok(users.into_iter().skip(offset).take(limit).collect())
        }
    }

    /// Reads fine, refuses every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl UserStore for ReadOnlyStore {
        async fn get_progress(&self, _: u64) -> Result<Option<UserProgress>, LevelingError> {
            Ok(None)
        }

        async fn upsert_progress(&self, _: &UserProgress) -> Result<(), LevelingError> {
            Err(LevelingError::StorageError("disk full".to_string()))
        }

        async fn top_by_experience(
            &self,
            _: usize,
            _: usize,
        ) -> Result<Vec<UserProgress>, LevelingError> {
            Ok(Vec::new())
        }
    }

    struct FixedRoll(u64);

    impl XpRoll for FixedRoll {
        fn roll(&self, _: u64, _: u64) -> u64 {
            self.0
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn service(store: MockUserStore, roll: u64) -> LevelingService<MockUserStore, FixedRoll> {
        LevelingService::with_roll(store, LevelingConfig::default(), FixedRoll(roll))
    }

    fn awarded(result: AwardResult) -> Award {
        match result {
            AwardResult::Awarded(award) => award,
            AwardResult::Skipped { remaining } => panic!("unexpected skip ({remaining})"),
        }
    }

    #[tokio::test]
    async fn test_five_max_rolls_reach_one_hundred_xp_at_baseline() {
        let service = service(MockUserStore::new(), 20);

        for i in 0..5 {
            awarded(service.on_activity(1, at(i * 20)).await.unwrap());
        }

        let profile = service.profile(1, at(100)).await.unwrap();
        assert_eq!(profile.progress.experience, 100);
        assert_eq!(profile.progress.level, level_from_experience(100));
        assert_eq!(profile.progress.level, BASELINE_LEVEL);
    }

    #[tokio::test]
    async fn test_multiplier_scales_the_roll() {
        let store = MockUserStore::with(vec![UserProgress {
            xp_multiplier: 2.0,
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let award = awarded(service.on_activity(1, at(0)).await.unwrap());
        assert_eq!(award.amount, 20);
        assert_eq!(award.experience, 20);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_until_window_passes() {
        let store = MockUserStore::with(vec![UserProgress {
            experience: 50,
            last_xp_time: Some(at(0)),
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let result = service.on_activity(1, at(19)).await.unwrap();
        assert_eq!(
            result,
            AwardResult::Skipped {
                remaining: Duration::seconds(1)
            }
        );
        let unchanged = service.profile(1, at(19)).await.unwrap().progress;
        assert_eq!(unchanged.experience, 50);
        assert_eq!(unchanged.last_xp_time, Some(at(0)));

        let award = awarded(service.on_activity(1, at(20)).await.unwrap());
        assert_eq!(award.experience, 60);
    }

    #[tokio::test]
    async fn test_cached_cooldown_skips_without_store() {
        let service = service(MockUserStore::new(), 10);
        awarded(service.on_activity(1, at(0)).await.unwrap());

        assert!(matches!(
            service.on_activity(1, at(5)).await.unwrap(),
            AwardResult::Skipped { .. }
        ));
        assert_eq!(service.profile(1, at(5)).await.unwrap().progress.experience, 10);
    }

    #[tokio::test]
    async fn test_level_up_is_reported_once() {
        let store = MockUserStore::with(vec![UserProgress {
            experience: 150,
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let award = awarded(service.on_activity(1, at(0)).await.unwrap());
        assert_eq!(
            award.level_up,
            Some(LevelUpEvent {
                user_id: 1,
                old_level: 0,
                new_level: 1,
                total_experience: 160,
                stickers_unlocked: false,
            })
        );

        let award = awarded(service.on_activity(1, at(20)).await.unwrap());
        assert_eq!(award.level_up, None);
    }

    #[tokio::test]
    async fn test_stickers_unlock_when_crossing_the_unlock_level() {
        let start = required_experience(25) - 5;
        let store = MockUserStore::with(vec![UserProgress {
            experience: start,
            level: 24,
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let award = awarded(service.on_activity(1, at(0)).await.unwrap());
        let event = award.level_up.unwrap();
        assert_eq!(event.new_level, 25);
        assert!(event.stickers_unlocked);
        assert!(service.profile(1, at(0)).await.unwrap().progress.stickers_unlocked);
    }

    #[tokio::test]
    async fn test_stale_level_is_healed_on_award() {
        let store = MockUserStore::with(vec![UserProgress {
            experience: 300,
            level: 0,
            ..UserProgress::new(1)
        }]);
        let service = service(store, 5);

        let award = awarded(service.on_activity(1, at(0)).await.unwrap());
        assert_eq!(award.level, 3);
        // The stale level is not reported as a level-up.
        assert_eq!(award.level_up, None);
    }

    #[tokio::test]
    async fn test_invalid_multiplier_leaves_stored_value() {
        let service = service(MockUserStore::new(), 10);
        awarded(service.on_activity(1, at(0)).await.unwrap());
        service.set_multiplier(1, 1.5, None).await.unwrap();

        let err = service.set_multiplier(1, 0.05, None).await.unwrap_err();
        assert!(matches!(err, LevelingError::InvalidMultiplier { .. }));
        assert_eq!(service.profile(1, at(0)).await.unwrap().progress.xp_multiplier, 1.5);
    }

    #[tokio::test]
    async fn test_expired_multiplier_awards_base_xp() {
        let store = MockUserStore::with(vec![UserProgress {
            xp_multiplier: 3.0,
            multiplier_expires_at: Some(at(10)),
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let award = awarded(service.on_activity(1, at(10)).await.unwrap());
        assert_eq!(award.amount, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_burst_for_one_user_awards_once() {
        let service = Arc::new(service(MockUserStore::new(), 10));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.on_activity(7, at(0)).await.unwrap()
            }));
        }

        let mut awards = 0;
        for handle in handles {
            if let AwardResult::Awarded(_) = handle.await.unwrap() {
                awards += 1;
            }
        }
        assert_eq!(awards, 1);
        assert_eq!(service.profile(7, at(0)).await.unwrap().progress.experience, 10);
    }

    #[tokio::test]
    async fn test_modify_experience_clamps_and_tracks_level() {
        let store = MockUserStore::with(vec![UserProgress {
            experience: 220,
            level: 2,
            ..UserProgress::new(1)
        }]);
        let service = service(store, 10);

        let change = service.modify_experience(1, -100).await.unwrap();
        assert_eq!(change.new_experience, 120);
        assert_eq!((change.old_level, change.new_level), (2, 0));
        assert_eq!(change.level_up(), None);

        let change = service.modify_experience(1, -1_000).await.unwrap();
        assert_eq!(change.new_experience, 0);

        let change = service.modify_experience(1, 300).await.unwrap();
        assert_eq!(change.level_up().map(|e| e.new_level), Some(3));
    }

    #[tokio::test]
    async fn test_admin_edits_require_a_known_user() {
        let service = service(MockUserStore::new(), 10);
        assert!(matches!(
            service.modify_experience(9, 10).await,
            Err(LevelingError::UnknownUser(9))
        ));
        assert!(matches!(
            service.set_multiplier(9, 2.0, None).await,
            Err(LevelingError::UnknownUser(9))
        ));
    }

    #[tokio::test]
    async fn test_set_level_validates_and_lands_on_threshold() {
        let service = service(MockUserStore::with(vec![UserProgress::new(1)]), 10);

        assert!(matches!(
            service.set_level(1, -1).await,
            Err(LevelingError::InvalidLevelTarget { requested: -1, .. })
        ));
        assert!(matches!(
            service.set_level(1, 101).await,
            Err(LevelingError::InvalidLevelTarget { .. })
        ));

        let change = service.set_level(1, 5).await.unwrap();
        assert_eq!(change.new_experience, 425);
        assert_eq!(level_from_experience(change.new_experience), 5);

        let change = service.set_level(1, 30).await.unwrap();
        assert!(change.stickers_unlocked);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_and_keeps_cooldown_open() {
        let service =
            LevelingService::with_roll(ReadOnlyStore, LevelingConfig::default(), FixedRoll(10));

        let err = service.on_activity(1, at(0)).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(service.cooldown_gate().check_cached(1, at(1)).is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_orders_and_pages() {
        let store = MockUserStore::with(vec![
            UserProgress { experience: 500, ..UserProgress::new(1) },
            UserProgress { experience: 300, ..UserProgress::new(2) },
            UserProgress { experience: 700, ..UserProgress::new(3) },
        ]);
        let service = service(store, 10);

        let top = service.leaderboard(2, 0).await.unwrap();
        assert_eq!(top.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(top[0].level, level_from_experience(700));

        let rest = service.leaderboard(10, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].user_id, 2);

        assert!(service.leaderboard(0, 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_scaled_award_floors_and_clamps() {
        assert_eq!(scaled_award(10, 2.0), 20);
        assert_eq!(scaled_award(7, 1.5), 10);
        assert_eq!(scaled_award(5, 0.1), 0);
        assert_eq!(scaled_award(5, -1.0), 0);
    }

    #[test]
    fn test_thread_roll_stays_in_range() {
        for _ in 0..200 {
            let value = ThreadRngRoll.roll(5, 20);
            assert!((5..=20).contains(&value));
        }
        assert_eq!(ThreadRngRoll.roll(8, 8), 8);
    }
}
