// Announcements for the console frontend.
//
// Text mode prints one human line per notification; JSON mode prints one
// serialized `Notification` per line for piping into other tools.

use crate::core::moderation::format_duration;
use crate::core::notify::{Notification, Notifier};
use crate::infra::config::OutputFormat;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub struct ConsoleNotifier<W> {
    out: Mutex<W>,
    format: OutputFormat,
}

impl<W: AsyncWrite + Unpin + Send> ConsoleNotifier<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out: Mutex::new(out),
            format,
        }
    }
}

impl ConsoleNotifier<tokio::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(tokio::io::stdout(), format)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Notifier for ConsoleNotifier<W> {
    async fn notify(&self, notification: Notification) {
        let line = match self.format {
            OutputFormat::Text => render(&notification),
            OutputFormat::Json => match serde_json::to_string(&notification) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize notification: {}", e);
                    return;
                }
            },
        };

        let mut out = self.out.lock().await;
        let written = async {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::error!("Failed to write announcement: {}", e);
        }
    }
}

/// Human-readable one-liner for a notification.
pub fn render(notification: &Notification) -> String {
    match notification {
        Notification::LevelUp { event, title } => {
            let mut line = format!(
                "[level-up] user {} reached level {} ({}) with {} XP. {}",
                event.user_id,
                event.new_level,
                title,
                event.total_experience,
                random_flavor_line()
            );
            if event.stickers_unlocked {
                line.push_str(" Stickers unlocked!");
            }
            line
        }
        Notification::Warned {
            warning,
            active_warnings,
            max_warnings,
        } => format!(
            "[warn] user {} warned by {} ({}/{}): {}",
            warning.user_id, warning.moderator_id, active_warnings, max_warnings, warning.reason
        ),
        Notification::AutoBanned { ban } => format!(
            "[autoban] user {} banned for {}: {}",
            ban.user_id,
            ban.expires_at
                .map(|expires_at| format_duration(expires_at - ban.issued_at))
                .unwrap_or_else(|| "ever".to_string()),
            ban.reason
        ),
        Notification::Banned { ban } => match ban.expires_at {
            Some(expires_at) => format!(
                "[ban] user {} banned for {}: {}",
                ban.user_id,
                format_duration(expires_at - ban.issued_at),
                ban.reason
            ),
            None => format!("[ban] user {} banned permanently: {}", ban.user_id, ban.reason),
        },
        Notification::Unbanned { user_id } => format!("[unban] user {user_id} unbanned"),
        Notification::Muted { mute } => format!(
            "[mute] user {} muted for {}: {}",
            mute.user_id,
            format_duration(mute.expires_at - mute.issued_at),
            mute.reason
        ),
        Notification::Unmuted { user_id } => format!("[unmute] user {user_id} unmuted"),
        Notification::WarningsCleared { user_id, removed } => {
            format!("[warn] cleared {removed} warning(s) for user {user_id}")
        }
        Notification::MessageFiltered { user_id, word } => {
            format!("[filter] removed a message from user {user_id} containing '{word}'")
        }
    }
}

fn random_flavor_line() -> &'static str {
    const FLAVOR_LINES: [&str; 4] = [
        "Keep the streak going!",
        "Your grind is paying off.",
        "One step closer to the stars.",
        "The community noticed.",
    ];
    FLAVOR_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FLAVOR_LINES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leveling::LevelUpEvent;
    use crate::core::moderation::BanRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn autoban() -> Notification {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Notification::AutoBanned {
            ban: BanRecord {
                user_id: 7,
                moderator_id: None,
                reason: "exceeded the warning limit".to_string(),
                issued_at,
                expires_at: Some(issued_at + Duration::hours(24)),
                automatic: true,
            },
        }
    }

    #[test]
    fn test_renders_autoban_length() {
        assert_eq!(
            render(&autoban()),
            "[autoban] user 7 banned for 1d: exceeded the warning limit"
        );
    }

    #[test]
    fn test_renders_sticker_unlock() {
        let line = render(&Notification::LevelUp {
            event: LevelUpEvent {
                user_id: 3,
                old_level: 24,
                new_level: 25,
                total_experience: 3_225,
                stickers_unlocked: true,
            },
            title: "Planet",
        });
        assert!(line.starts_with("[level-up] user 3 reached level 25 (Planet)"));
        assert!(line.ends_with("Stickers unlocked!"));
    }

    #[tokio::test]
    async fn test_json_mode_writes_tagged_lines() {
        let notifier = ConsoleNotifier::new(Vec::new(), OutputFormat::Json);
        notifier.notify(autoban()).await;
        notifier
            .notify(Notification::Unbanned { user_id: 7 })
            .await;

        let out = notifier.out.lock().await;
        let text = String::from_utf8(out.clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "auto_banned");
        assert_eq!(lines[0]["ban"]["automatic"], true);
        assert_eq!(lines[1], serde_json::json!({"kind": "unbanned", "user_id": 7}));
    }
}
