// In-memory implementation of UserStore.
//
// DashMap gives us a concurrent map without wrapping everything in a Mutex.
// Nothing survives a restart, so this is for tests and throwaway runs.

use crate::core::leveling::{LevelingError, UserProgress, UserStore};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<u64, UserProgress>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_progress(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError> {
        Ok(self.users.get(&user_id).map(|entry| entry.clone()))
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
        let mut users: Vec<UserProgress> =
            self.users.iter().map(|entry| entry.value().clone()).collect();

        // Ties broken by id so paging is stable.
        users.sort_by(|a, b| {
            b.experience
                .cmp(&a.experience)
                .then(a.user_id.cmp(&b.user_id))
        });

        Ok(users.into_iter().skip(offset).take(limit).collect())
    }
}
