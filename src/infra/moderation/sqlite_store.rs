// SQLite-backed moderation store.
//
// Tables:
// - warnings: one row per active warning
// - bans: at most one row per user
// - mutes: at most one row per user

use crate::core::moderation::{
    BanRecord, EscalationPolicy, ModerationError, ModerationStore, MuteRecord, Warning,
    WarningAdded,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Pool, Row, Sqlite};

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

fn storage_err(e: sqlx::Error) -> ModerationError {
    ModerationError::StorageError(e.to_string())
}

fn row_to_warning(row: &SqliteRow) -> Result<Warning, sqlx::Error> {
    Ok(Warning {
        id: row.try_get::<i64, _>("id")? as u64,
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        moderator_id: row.try_get::<i64, _>("moderator_id")? as u64,
        reason: row.try_get("reason")?,
        issued_at: row.try_get("issued_at")?,
    })
}

fn row_to_ban(row: &SqliteRow) -> Result<BanRecord, sqlx::Error> {
    Ok(BanRecord {
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        moderator_id: row
            .try_get::<Option<i64>, _>("moderator_id")?
            .map(|id| id as u64),
        reason: row.try_get("reason")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        automatic: row.try_get("automatic")?,
    })
}

fn row_to_mute(row: &SqliteRow) -> Result<MuteRecord, sqlx::Error> {
    Ok(MuteRecord {
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        moderator_id: row.try_get::<i64, _>("moderator_id")? as u64,
        reason: row.try_get("reason")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

async fn upsert_ban<'e, E>(executor: E, ban: &BanRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO bans (user_id, moderator_id, reason, issued_at, expires_at, automatic)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            moderator_id = excluded.moderator_id,
            reason = excluded.reason,
            issued_at = excluded.issued_at,
            expires_at = excluded.expires_at,
            automatic = excluded.automatic
        "#,
    )
    .bind(ban.user_id as i64)
    .bind(ban.moderator_id.map(|id| id as i64))
    .bind(ban.reason.clone())
    .bind(ban.issued_at)
    .bind(ban.expires_at)
    .bind(ban.automatic)
    .execute(executor)
    .await?;
    Ok(())
}

impl SqliteModerationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                issued_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_warnings_user ON warnings(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bans (
                user_id INTEGER PRIMARY KEY,
                moderator_id INTEGER,
                reason TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT,
                automatic BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mutes (
                user_id INTEGER PRIMARY KEY,
                moderator_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn add_warning(
        &self,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        issued_at: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<WarningAdded, ModerationError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let id = sqlx::query(
            "INSERT INTO warnings (user_id, moderator_id, reason, issued_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id as i64)
        .bind(moderator_id as i64)
        .bind(reason)
        .bind(issued_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .last_insert_rowid();

        let active_count: i64 = sqlx::query("SELECT COUNT(*) FROM warnings WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?
            .try_get(0)
            .map_err(storage_err)?;
        let active_count = active_count as u32;

        let autoban = policy.on_warning_added(
            user_id,
            active_count.saturating_sub(1),
            active_count,
            issued_at,
        );
        if let Some(ban) = &autoban {
            upsert_ban(&mut *tx, ban).await.map_err(storage_err)?;
        }

        // Dropping tx on any error above rolls the warning back.
        tx.commit().await.map_err(storage_err)?;

        Ok(WarningAdded {
            warning: Warning {
                id: id as u64,
                user_id,
                moderator_id,
                reason: reason.to_string(),
                issued_at,
            },
            active_count,
            autoban,
        })
    }

    async fn get_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        let row = sqlx::query("SELECT * FROM warnings WHERE id = ?")
            .bind(warning_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref()
            .map(row_to_warning)
            .transpose()
            .map_err(storage_err)
    }

    async fn active_warnings(&self, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        let rows = sqlx::query("SELECT * FROM warnings WHERE user_id = ? ORDER BY id ASC")
            .bind(user_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter()
            .map(row_to_warning)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)
    }

    async fn remove_warning(&self, warning_id: u64) -> Result<Option<Warning>, ModerationError> {
        let row = sqlx::query("DELETE FROM warnings WHERE id = ? RETURNING *")
            .bind(warning_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref()
            .map(row_to_warning)
            .transpose()
            .map_err(storage_err)
    }

    async fn clear_warnings(&self, user_id: u64) -> Result<u32, ModerationError> {
        let result = sqlx::query("DELETE FROM warnings WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() as u32)
    }

    async fn set_ban(&self, ban: &BanRecord) -> Result<(), ModerationError> {
        upsert_ban(&self.pool, ban).await.map_err(storage_err)
    }

    async fn get_ban(&self, user_id: u64) -> Result<Option<BanRecord>, ModerationError> {
        let row = sqlx::query("SELECT * FROM bans WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref()
            .map(row_to_ban)
            .transpose()
            .map_err(storage_err)
    }

    async fn clear_ban(&self, user_id: u64) -> Result<bool, ModerationError> {
        let result = sqlx::query("DELETE FROM bans WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_mute(&self, mute: &MuteRecord) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO mutes (user_id, moderator_id, reason, issued_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                moderator_id = excluded.moderator_id,
                reason = excluded.reason,
                issued_at = excluded.issued_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(mute.user_id as i64)
        .bind(mute.moderator_id as i64)
        .bind(&mute.reason)
        .bind(mute.issued_at)
        .bind(mute.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_mute(&self, user_id: u64) -> Result<Option<MuteRecord>, ModerationError> {
        let row = sqlx::query("SELECT * FROM mutes WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref()
            .map(row_to_mute)
            .transpose()
            .map_err(storage_err)
    }

    async fn clear_mute(&self, user_id: u64) -> Result<bool, ModerationError> {
        let result = sqlx::query("DELETE FROM mutes WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }
}
