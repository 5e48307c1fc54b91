// SQLite-backed UserStore.
//
// One row per user. `upsert_progress` writes every column in a single
// statement, so experience and level can never be persisted apart.

use crate::core::leveling::{LevelingError, UserProgress, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteUserStore {
    pool: Pool<Sqlite>,
}

impl SqliteUserStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_progress (
                user_id INTEGER PRIMARY KEY,
                experience INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0,
                last_xp_time TEXT,
                xp_multiplier REAL NOT NULL DEFAULT 1.0,
                multiplier_expires_at TEXT,
                stickers_unlocked BOOLEAN NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_user_progress_experience
                ON user_progress(experience DESC);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_progress(row: &SqliteRow) -> Result<UserProgress, sqlx::Error> {
    Ok(UserProgress {
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        experience: row.try_get::<i64, _>("experience")?.max(0) as u64,
        level: row.try_get::<i64, _>("level")?.max(0) as u32,
        last_xp_time: row.try_get::<Option<DateTime<Utc>>, _>("last_xp_time")?,
        xp_multiplier: row.try_get("xp_multiplier")?,
        multiplier_expires_at: row.try_get::<Option<DateTime<Utc>>, _>("multiplier_expires_at")?,
        stickers_unlocked: row.try_get("stickers_unlocked")?,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_progress(&self, user_id: u64) -> Result<Option<UserProgress>, LevelingError> {
        let row = sqlx::query("SELECT * FROM user_progress WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        row.as_ref()
            .map(row_to_progress)
            .transpose()
            .map_err(|e| LevelingError::StorageError(e.to_string()))
    }

    async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), LevelingError> {
        // SQLite integers are signed; clamp rather than wrap.
        let experience = progress.experience.min(i64::MAX as u64) as i64;

        sqlx::query(
            r#"
            INSERT INTO user_progress
                (user_id, experience, level, last_xp_time, xp_multiplier,
                 multiplier_expires_at, stickers_unlocked)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                experience = excluded.experience,
                level = excluded.level,
                last_xp_time = excluded.last_xp_time,
                xp_multiplier = excluded.xp_multiplier,
                multiplier_expires_at = excluded.multiplier_expires_at,
                stickers_unlocked = excluded.stickers_unlocked
            "#,
        )
        .bind(progress.user_id as i64)
        .bind(experience)
        .bind(progress.level as i64)
        .bind(progress.last_xp_time)
        .bind(progress.xp_multiplier)
        .bind(progress.multiplier_expires_at)
        .bind(progress.stickers_unlocked)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn top_by_experience(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UserProgress>, LevelingError> {
        let rows = sqlx::query(
            "SELECT * FROM user_progress ORDER BY experience DESC, user_id ASC LIMIT ? OFFSET ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        rows.iter()
            .map(row_to_progress)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LevelingError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leveling::{AwardResult, LevelingConfig, LevelingService};
    use crate::infra::sqlite_pool::open_pool;
    use chrono::TimeZone;

    async fn store_at(path: &std::path::Path) -> SqliteUserStore {
        let pool = open_pool(path.to_str().unwrap()).await.unwrap();
        let store = SqliteUserStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_round_trips_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir.path().join("users.db")).await;

        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let progress = UserProgress {
            user_id: 42,
            experience: 250,
            level: 2,
            last_xp_time: Some(at),
            xp_multiplier: 1.5,
            multiplier_expires_at: Some(at + chrono::Duration::days(1)),
            stickers_unlocked: true,
        };
        store.upsert_progress(&progress).await.unwrap();

        assert_eq!(store.get_progress(42).await.unwrap(), Some(progress));
        assert_eq!(store.get_progress(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_leaderboard_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir.path().join("users.db")).await;

        for (id, xp) in [(1, 500), (2, 300), (3, 700)] {
            store
                .upsert_progress(&UserProgress {
                    experience: xp,
                    ..UserProgress::new(id)
                })
                .await
                .unwrap();
        }

        let top = store.top_by_experience(2, 0).await.unwrap();
        assert_eq!(top.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![3, 1]);
        let rest = store.top_by_experience(2, 2).await.unwrap();
        assert_eq!(rest.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_cooldown_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let first = LevelingService::new(store_at(&path).await, LevelingConfig::default());
        assert!(matches!(
            first.on_activity(1, t0).await.unwrap(),
            AwardResult::Awarded(_)
        ));
        drop(first);

        // Fresh service, empty cooldown cache, same database.
        let second = LevelingService::new(store_at(&path).await, LevelingConfig::default());
        assert!(matches!(
            second.on_activity(1, t0 + chrono::Duration::seconds(5)).await.unwrap(),
            AwardResult::Skipped { .. }
        ));
        assert!(matches!(
            second.on_activity(1, t0 + chrono::Duration::seconds(20)).await.unwrap(),
            AwardResult::Awarded(_)
        ));
    }
}
