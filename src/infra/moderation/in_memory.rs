// In-memory ModerationStore backed by DashMap.

use crate::core::moderation::{
    BanRecord, EscalationPolicy, ModerationError, ModerationStore, MuteRecord, Warning,
    WarningAdded,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct InMemoryModerationStore {
    next_warning_id: AtomicU64,
    warnings: DashMap<u64, Vec<Warning>>,
    bans: DashMap<u64, BanRecord>,
    mutes: DashMap<u64, MuteRecord>,
}

impl InMemoryModerationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModerationStore for InMemoryModerationStore {
    async fn add_warning(
        &self,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        issued_at: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<WarningAdded, ModerationError> {
        let warning = Warning {
            id: self.next_warning_id.fetch_add(1, Ordering::Relaxed) + 1,
            user_id,
            moderator_id,
            reason: reason.to_string(),
            issued_at,
        };

        // The entry guard holds the shard lock until the ban is written, so the
        // push, the count and the autoban land together.
        let mut warnings = self.warnings.entry(user_id).or_default();
        warnings.push(warning.clone());
        let active_count = warnings.len() as u32;

        let autoban =
            policy.on_warning_added(user_id, active_count - 1, active_count, issued_at);
        if let Some(ban) = &autoban {
            self.bans.insert(user_id, ban.clone());
        }

        Ok(WarningAdded {
            warning,
            active_count,
            autoban,
        })
    }

    async fn get_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        Ok(self
            .warnings
            .iter()
            .find_map(|entry| entry.iter().find(|w| w.id == warning_id).cloned()))
    }

    async fn active_warnings(&self, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        Ok(self
            .warnings
            .get(&user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn remove_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        for mut entry in self.warnings.iter_mut() {
            if let Some(index) = entry.iter().position(|w| w.id == warning_id) {
                return Ok(Some(entry.remove(index)));
            }
        }
        Ok(None)
    }

    async fn clear_warnings(&self, user_id: u64) -> Result<u32, ModerationError> {
        Ok(self
            .warnings
            .remove(&user_id)
            .map(|(_, warnings)| warnings.len() as u32)
            .unwrap_or(0))
    }

    async fn set_ban(&self, ban: &BanRecord) -> Result<(), ModerationError> {
        self.bans.insert(ban.user_id, ban.clone());
        Ok(())
    }

    async fn get_ban(&self, user_id: u64) -> Result<Option<BanRecord>, ModerationError> {
        Ok(self.bans.get(&user_id).map(|entry| entry.clone()))
    }

    async fn clear_ban(&self, user_id: u64) -> Result<bool, ModerationError> {
        Ok(self.bans.remove(&user_id).is_some())
    }

    async fn set_mute(&self, mute: &MuteRecord) -> Result<(), ModerationError> {
        self.mutes.insert(mute.user_id, mute.clone());
        Ok(())
    }

    async fn get_mute(&self, user_id: u64) -> Result<Option<MuteRecord>, ModerationError> {
        Ok(self.mutes.get(&user_id).map(|entry| entry.clone()))
    }

    async fn clear_mute(&self, user_id: u64) -> Result<bool, ModerationError> {
        Ok(self.mutes.remove(&user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_warning_counts_per_user() {
        let store = InMemoryModerationStore::new();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let policy = EscalationPolicy::new(3, chrono::Duration::hours(1));

        let first = store.add_warning(1, 9, "a", now, &policy).await.unwrap();
        let second = store.add_warning(1, 9, "b", now, &policy).await.unwrap();
        let other = store.add_warning(2, 9, "c", now, &policy).await.unwrap();

        assert_eq!((first.active_count, second.active_count), (1, 2));
        assert_eq!(other.active_count, 1);
        assert_ne!(first.warning.id, second.warning.id);
        assert_eq!(store.get_warning(second.warning.id).await.unwrap(), Some(second.warning));

        let removed = store.remove_warning(first.warning.id).await.unwrap();
        assert_eq!(removed.map(|w| w.reason), Some("a".to_string()));
        assert_eq!(store.active_warnings(1).await.unwrap().len(), 1);
        assert_eq!(store.clear_warnings(1).await.unwrap(), 1);
        assert_eq!(store.clear_warnings(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_crossing_warning_writes_the_ban_with_it() {
        let store = InMemoryModerationStore::new();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let policy = EscalationPolicy::new(2, chrono::Duration::hours(1));

        let first = store.add_warning(4, 9, "a", now, &policy).await.unwrap();
        assert!(first.autoban.is_none());
        assert_eq!(store.get_ban(4).await.unwrap(), None);

        let second = store.add_warning(4, 9, "b", now, &policy).await.unwrap();
        assert_eq!(store.get_ban(4).await.unwrap(), second.autoban);
        assert!(second.autoban.is_some());

        let third = store.add_warning(4, 9, "c", now, &policy).await.unwrap();
        assert!(third.autoban.is_none());
    }
}
