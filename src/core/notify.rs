// Outbound announcements.
//
// The core and the command layer describe what happened; a `Notifier`
// decides how and where to say it.

use crate::core::leveling::LevelUpEvent;
use crate::core::moderation::{BanRecord, MuteRecord, Warning};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    LevelUp {
        event: LevelUpEvent,
        title: &'static str,
    },
    Warned {
        warning: Warning,
        active_warnings: u32,
        max_warnings: u32,
    },
    AutoBanned {
        ban: BanRecord,
    },
    Banned {
        ban: BanRecord,
    },
    Unbanned {
        user_id: u64,
    },
    Muted {
        mute: MuteRecord,
    },
    Unmuted {
        user_id: u64,
    },
    WarningsCleared {
        user_id: u64,
        removed: u32,
    },
    MessageFiltered {
        user_id: u64,
        word: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}
