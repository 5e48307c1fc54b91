// Console commands module.
// Each feature gets its own command file; this file routes lines to them.

pub mod filter;
pub mod leveling;
pub mod moderation;

use crate::core::filter::{BannedWordStore, WordFilterService};
use crate::core::leveling::{LevelingService, UserStore};
use crate::core::moderation::{ModerationService, ModerationStore};
use crate::core::notify::Notifier;
use crate::core::permissions::{require, Capability, Role, RoleDirectory};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Shared state handed to every command.
pub struct Data {
    pub leveling: Arc<LevelingService<Box<dyn UserStore>>>,
    pub moderation: Arc<ModerationService<Box<dyn ModerationStore>>>,
    pub filter: Arc<WordFilterService<Box<dyn BannedWordStore>>>,
    pub roles: RoleDirectory,
    pub notifier: Arc<dyn Notifier>,
}

/// Who is running a command, and when.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    data: &'a Data,
    author: u64,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub fn new(data: &'a Data, author: u64, now: DateTime<Utc>) -> Self {
        Self { data, author, now }
    }

    pub fn data(&self) -> &'a Data {
        self.data
    }

    pub fn author(&self) -> u64 {
        self.author
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn role(&self) -> Role {
        self.data.roles.role_of(self.author)
    }

    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        require(self.role(), capability)?;
        Ok(())
    }
}

/// Required positional argument.
pub(crate) fn arg<T: FromStr>(args: &[&str], index: usize, name: &str) -> Result<T, Error> {
    let raw = args
        .get(index)
        .ok_or_else(|| format!("missing <{name}>"))?;
    raw.parse()
        .map_err(|_| format!("invalid <{name}>: '{raw}'").into())
}

/// Everything from `index` on, or `fallback` if nothing is there.
pub(crate) fn rest(args: &[&str], index: usize, fallback: &str) -> String {
    match args.get(index..) {
        Some(tail) if !tail.is_empty() => tail.join(" "),
        _ => fallback.to_string(),
    }
}

const HELP: &[(&str, Capability, &str)] = &[
    ("msg <text>", Capability::Participate, "send a chat message"),
    ("profile [user]", Capability::Participate, "show level and title"),
    ("top [limit] [page]", Capability::Participate, "leaderboard"),
    ("warn <user> [reason]", Capability::Moderate, "issue a warning"),
    ("unwarn <warning_id>", Capability::Moderate, "remove one warning"),
    ("clearwarns <user>", Capability::Moderate, "remove all warnings"),
    ("warnings <user>", Capability::Moderate, "list active warnings"),
    ("mute <user> [duration] [reason]", Capability::Moderate, "mute"),
    ("unmute <user>", Capability::Moderate, "lift a mute"),
    ("ban <user> [duration|perm] [reason]", Capability::Moderate, "ban"),
    ("unban <user>", Capability::Moderate, "lift a ban"),
    ("status <user>", Capability::Moderate, "warnings, ban and mute"),
    ("xp <user> <+n|-n>", Capability::Administer, "adjust experience"),
    ("setlevel <user> <level>", Capability::Administer, "set level"),
    ("multiplier <user> <value> [duration]", Capability::Administer, "set XP multiplier"),
    ("badword add|remove|list [word]", Capability::Administer, "manage banned words"),
];

fn help(ctx: Context<'_>) -> String {
    let role = ctx.role();
    let mut out = format!("Commands available to {role:?}:");
    for (usage, capability, summary) in HELP {
        if require(role, *capability).is_ok() {
            out.push_str(&format!("\n  {usage:<38} {summary}"));
        }
    }
    out
}

/// Parse and run one input line. Blank lines yield `None`.
pub async fn dispatch(
    data: &Data,
    line: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, Error> {
    let mut words = line.split_whitespace();
    let Some(author) = words.next() else {
        return Ok(None);
    };
    let author: u64 = author
        .parse()
        .map_err(|_| format!("expected '<user_id> <command> ...', got '{line}'"))?;
    let command = words.next().ok_or("missing command")?;
    let args: Vec<&str> = words.collect();
    let ctx = Context::new(data, author, now);

    tracing::debug!(author, command, "Dispatching command");

    let reply = match command {
        "help" => help(ctx),
        "msg" => leveling::message(ctx, &args).await?,
        "profile" => leveling::profile(ctx, &args).await?,
        "top" => leveling::top(ctx, &args).await?,
        "xp" => leveling::xp(ctx, &args).await?,
        "setlevel" => leveling::set_level(ctx, &args).await?,
        "multiplier" => leveling::multiplier(ctx, &args).await?,
        "warn" => moderation::warn(ctx, &args).await?,
        "unwarn" => moderation::unwarn(ctx, &args).await?,
        "clearwarns" => moderation::clear_warnings(ctx, &args).await?,
        "warnings" => moderation::warnings(ctx, &args).await?,
        "mute" => moderation::mute(ctx, &args).await?,
        "unmute" => moderation::unmute(ctx, &args).await?,
        "ban" => moderation::ban(ctx, &args).await?,
        "unban" => moderation::unban(ctx, &args).await?,
        "status" => moderation::status(ctx, &args).await?,
        "badword" => filter::badword(ctx, &args).await?,
        other => return Err(format!("unknown command '{other}', try 'help'").into()),
    };
    Ok(Some(reply))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::leveling::LevelingConfig;
    use crate::core::moderation::EscalationConfig;
    use crate::core::notify::Notification;
    use crate::infra::filter::InMemoryWordStore;
    use crate::infra::leveling::InMemoryUserStore;
    use crate::infra::moderation::InMemoryModerationStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::sync::Mutex;

    pub const ADMIN: u64 = 1;
    pub const MODERATOR: u64 = 2;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: Notification) {
            self.sent.lock().await.push(notification);
        }
    }

    pub fn data() -> (Data, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let data = Data {
            leveling: Arc::new(LevelingService::new(
                Box::new(InMemoryUserStore::new()) as Box<dyn UserStore>,
                LevelingConfig::default(),
            )),
            moderation: Arc::new(ModerationService::new(
                Box::new(InMemoryModerationStore::new()) as Box<dyn ModerationStore>,
                EscalationConfig::default(),
            )),
            filter: Arc::new(WordFilterService::new(
                Box::new(InMemoryWordStore::new()) as Box<dyn BannedWordStore>
            )),
            roles: RoleDirectory::new([ADMIN], [MODERATOR]),
            notifier: notifier.clone(),
        };
        (data, notifier)
    }

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub async fn run(data: &Data, line: &str, secs: i64) -> Result<String, Error> {
        dispatch(data, line, at(secs)).await.map(|r| r.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_blank_lines_are_ignored() {
        let (data, _) = data();
        assert_eq!(dispatch(&data, "   ", at(0)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_errors() {
        let (data, _) = data();
        assert!(run(&data, "bob msg hi", 0).await.is_err());
        assert!(run(&data, "5", 0).await.is_err());
        let err = run(&data, "5 dance", 0).await.unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }

    #[tokio::test]
    async fn test_help_lists_only_permitted_commands() {
        let (data, _) = data();
        let member = run(&data, "5 help", 0).await.unwrap();
        assert!(member.contains("profile"));
        assert!(!member.contains("warn"));

        let admin = run(&data, &format!("{ADMIN} help"), 0).await.unwrap();
        assert!(admin.contains("badword"));
    }

    #[test]
    fn test_args_report_what_is_missing() {
        let err = arg::<u64>(&[], 0, "user").unwrap_err();
        assert_eq!(err.to_string(), "missing <user>");
        let err = arg::<u64>(&["x"], 0, "user").unwrap_err();
        assert_eq!(err.to_string(), "invalid <user>: 'x'");
        assert_eq!(rest(&["a", "b", "c"], 1, "none"), "b c");
        assert_eq!(rest(&["a"], 1, "none"), "none");
    }
}
