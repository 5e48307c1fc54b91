// Cooldown gate for XP awards.
//
// The persisted `last_xp_time` is the source of truth. The gate also keeps the
// most recent award time per user in memory so a burst of messages can be
// rejected before touching the store. After a restart the map is empty and the
// persisted timestamp takes over again.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub struct CooldownGate {
    window: Duration,
    /// user_id -> last successful award seen by this process
    recent: DashMap<u64, DateTime<Utc>>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left before `last` stops blocking an award at `now`.
    ///
    /// `None` means the user may earn XP. A timestamp in the future (clock
    /// moved backwards) counts as still cooling down.
    pub fn remaining(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Duration> {
        let last = last?;
        let elapsed = now - last;
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }

    /// Fast-path check against the in-process cache only.
    pub fn check_cached(&self, user_id: u64, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.recent.get(&user_id).map(|entry| *entry);
        self.remaining(last, now)
    }

    /// Remember an award (or a persisted timestamp we just read).
    pub fn record(&self, user_id: u64, at: DateTime<Utc>) {
        self.recent
            .entry(user_id)
            .and_modify(|last| {
                if at > *last {
                    *last = at;
                }
            })
            .or_insert(at);
    }

    /// Drop cache entries whose window has already passed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.recent.len();
        self.recent.retain(|_, last| now - *last < self.window);
        before.saturating_sub(self.recent.len())
    }
}
