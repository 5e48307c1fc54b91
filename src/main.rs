// This is the entry point of the bot.
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Read commands from stdin and hand each one to its own task
// 4. Run periodic housekeeping

use anyhow::Context;
use chrono::Utc;
use community_bot::console::announcements::ConsoleNotifier;
use community_bot::console::{dispatch, Data};
use community_bot::core::cooldown::UserLocks;
use community_bot::core::filter::{BannedWordStore, WordFilterService};
use community_bot::core::leveling::{LevelingService, UserStore};
use community_bot::core::moderation::{ModerationService, ModerationStore};
use community_bot::core::permissions::RoleDirectory;
use community_bot::infra::config::{BotConfig, Storage};
use community_bot::infra::filter::{InMemoryWordStore, SqliteWordStore};
use community_bot::infra::leveling::{InMemoryUserStore, SqliteUserStore};
use community_bot::infra::moderation::{InMemoryModerationStore, SqliteModerationStore};
use community_bot::infra::sqlite_pool::open_pool;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::io::{AsyncBufReadExt, BufReader};

type Stores = (
    Box<dyn UserStore>,
    Box<dyn ModerationStore>,
    Box<dyn BannedWordStore>,
);

async fn open_stores(storage: &Storage) -> anyhow::Result<Stores> {
    match storage {
        Storage::InMemory => {
            tracing::warn!("Using in-memory storage; nothing will survive a restart");
            Ok((
                Box::new(InMemoryUserStore::new()) as Box<dyn UserStore>,
                Box::new(InMemoryModerationStore::new()) as Box<dyn ModerationStore>,
                Box::new(InMemoryWordStore::new()) as Box<dyn BannedWordStore>,
            ))
        }
        Storage::Sqlite { url } => {
            let pool = open_pool(url)
                .await
                .with_context(|| format!("Failed to open database {url}"))?;

            let users = SqliteUserStore::new(pool.clone());
            users.migrate().await.context("Failed to migrate user tables")?;
            let moderation = SqliteModerationStore::new(pool.clone());
            moderation
                .migrate()
                .await
                .context("Failed to migrate moderation tables")?;
            let words = SqliteWordStore::new(pool);
            words.migrate().await.context("Failed to migrate word tables")?;

            Ok((
                Box::new(users) as Box<dyn UserStore>,
                Box::new(moderation) as Box<dyn ModerationStore>,
                Box::new(words) as Box<dyn BannedWordStore>,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let (user_store, moderation_store, word_store) = open_stores(&config.storage).await?;

    // One lock table so leveling and moderation never race on the same user.
    let locks = Arc::new(UserLocks::new());

    let data = Arc::new(Data {
        leveling: Arc::new(
            LevelingService::new(user_store, config.leveling.clone()).with_locks(locks.clone()),
        ),
        moderation: Arc::new(
            ModerationService::new(moderation_store, config.escalation.clone())
                .with_locks(locks.clone()),
        ),
        filter: Arc::new(WordFilterService::new(word_store)),
        roles: RoleDirectory::new(config.admin_ids.clone(), config.moderator_ids.clone()),
        notifier: Arc::new(ConsoleNotifier::stdout(config.output)),
    });

    // Background housekeeping: drop idle per-user locks and stale cooldown entries.
    let maintenance_data = Arc::clone(&data);
    let maintenance_locks = Arc::clone(&locks);
    let maintenance_every = StdDuration::from_secs(config.maintenance_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(maintenance_every);
        loop {
            interval.tick().await;
            let pruned = maintenance_locks.prune_idle();
            let evicted = maintenance_data
                .leveling
                .cooldown_gate()
                .evict_expired(Utc::now());
            tracing::debug!(pruned, evicted, "Housekeeping pass");
        }
    });

    tracing::info!(
        admins = config.admin_ids.len(),
        moderators = config.moderator_ids.len(),
        "Bot is ready, reading commands from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = tokio::task::JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        let data = Arc::clone(&data);
        tasks.spawn(async move {
            match dispatch(&data, &line, Utc::now()).await {
                Ok(Some(reply)) => println!("{reply}"),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(line = %line, "Command failed: {}", e);
                    println!("error: {e}");
                }
            }
        });
        // Reap finished tasks so the set doesn't grow with every line.
        while tasks.try_join_next().is_some() {}
    }

    // Let in-flight commands finish once stdin closes.
    while tasks.join_next().await.is_some() {}
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
