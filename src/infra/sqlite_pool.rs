// Shared SQLite connection pool for all stores.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open (creating if needed) the database at `database_url`.
///
/// Accepts `sqlite://path`, a bare path, or `sqlite::memory:`. An in-memory
/// database lives in one connection, so the pool is capped at one.
pub async fn open_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    if database_url.contains(":memory:") {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        return Ok(pool);
    }

    let path_str = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path_str = path_str.split('?').next().unwrap_or(path_str);
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", path_str))
        .await?;

    tracing::info!(path = path_str, "Opened SQLite database");
    Ok(pool)
}
