// SQLite-backed banned word list.

use crate::core::filter::{BannedWordStore, FilterError};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteWordStore {
    pool: Pool<Sqlite>,
}

impl SqliteWordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS banned_words (
                word TEXT PRIMARY KEY
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BannedWordStore for SqliteWordStore {
    async fn add_word(&self, word: &str) -> Result<bool, FilterError> {
        let result = sqlx::query("INSERT OR IGNORE INTO banned_words (word) VALUES (?)")
            .bind(word)
            .execute(&self.pool)
            .await
            .map_err(|e| FilterError::StorageError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_word(&self, word: &str) -> Result<bool, FilterError> {
        let result = sqlx::query("DELETE FROM banned_words WHERE word = ?")
            .bind(word)
            .execute(&self.pool)
            .await
            .map_err(|e| FilterError::StorageError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_words(&self) -> Result<Vec<String>, FilterError> {
        let rows = sqlx::query("SELECT word FROM banned_words ORDER BY word")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FilterError::StorageError(e.to_string()))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("word"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FilterError::StorageError(e.to_string()))
    }
}
