// Console commands for warnings, mutes and bans.

use super::{arg, rest, Context, Error};
use crate::core::moderation::{format_duration, parse_duration, BanLength, BanRecord};
use crate::core::notify::Notification;
use crate::core::permissions::Capability;

const NO_REASON: &str = "no reason given";

fn describe_expiry(ban: &BanRecord) -> String {
    match ban.expires_at {
        Some(expires_at) => format!("until {}", expires_at.format("%Y-%m-%d %H:%M UTC")),
        None => "permanently".to_string(),
    }
}

pub async fn warn(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let reason = rest(args, 1, NO_REASON);
    let data = ctx.data();

    let outcome = data
        .moderation
        .warn(user_id, ctx.author(), &reason, ctx.now())
        .await?;

    data.notifier
        .notify(Notification::Warned {
            warning: outcome.warning.clone(),
            active_warnings: outcome.active_warnings,
            max_warnings: outcome.max_warnings,
        })
        .await;

    let mut reply = format!(
        "Warned user {user_id} ({}/{}), warning #{}",
        outcome.active_warnings, outcome.max_warnings, outcome.warning.id
    );
    if let Some(ban) = outcome.autoban {
        reply.push_str(&format!("\nAutomatically banned {}", describe_expiry(&ban)));
        data.notifier.notify(Notification::AutoBanned { ban }).await;
    }
    Ok(reply)
}

pub async fn unwarn(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let warning_id: u64 = arg(args, 0, "warning_id")?;

    Ok(match ctx.data().moderation.remove_warning(warning_id).await? {
        Some(warning) => format!("Removed warning #{warning_id} from user {}", warning.user_id),
        None => format!("No warning #{warning_id}"),
    })
}

pub async fn clear_warnings(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let data = ctx.data();

    let removed = data.moderation.clear_warnings(user_id).await?;
    data.notifier
        .notify(Notification::WarningsCleared { user_id, removed })
        .await;
    Ok(format!("Cleared {removed} warning(s) for user {user_id}"))
}

pub async fn warnings(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;

    let warnings = ctx.data().moderation.warnings(user_id).await?;
    if warnings.is_empty() {
        return Ok(format!("User {user_id} has no active warnings"));
    }
    let lines: Vec<String> = warnings
        .iter()
        .map(|w| {
            format!(
                "#{} {} by {}: {}",
                w.id,
                w.issued_at.format("%Y-%m-%d %H:%M"),
                w.moderator_id,
                w.reason
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

pub async fn mute(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    // The duration is optional; anything that doesn't parse starts the reason.
    let (duration, reason_from) = match args.get(1).and_then(|raw| parse_duration(raw)) {
        Some(duration) => (Some(duration), 2),
        None => (None, 1),
    };
    let reason = rest(args, reason_from, NO_REASON);
    let data = ctx.data();

    let mute = data
        .moderation
        .mute(user_id, ctx.author(), duration, &reason, ctx.now())
        .await?;
    let length = format_duration(mute.expires_at - mute.issued_at);
    data.notifier.notify(Notification::Muted { mute }).await;
    Ok(format!("Muted user {user_id} for {length}"))
}

pub async fn unmute(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let data = ctx.data();

    if !data.moderation.unmute(user_id).await? {
        return Ok(format!("User {user_id} is not muted"));
    }
    data.notifier.notify(Notification::Unmuted { user_id }).await;
    Ok(format!("Unmuted user {user_id}"))
}

pub async fn ban(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let (length, reason_from) = match args.get(1).copied() {
        Some("perm") | Some("permanent") => (BanLength::Permanent, 2),
        Some(raw) => match parse_duration(raw) {
            Some(duration) => (BanLength::For(duration), 2),
            None => (BanLength::Default, 1),
        },
        None => (BanLength::Default, 1),
    };
    let reason = rest(args, reason_from, NO_REASON);
    let data = ctx.data();

    let ban = data
        .moderation
        .ban(user_id, ctx.author(), length, &reason, ctx.now())
        .await?;
    let reply = format!("Banned user {user_id} {}", describe_expiry(&ban));
    data.notifier.notify(Notification::Banned { ban }).await;
    Ok(reply)
}

pub async fn unban(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let data = ctx.data();

    if !data.moderation.unban(user_id).await? {
        return Ok(format!("User {user_id} is not banned"));
    }
    data.notifier.notify(Notification::Unbanned { user_id }).await;
    Ok(format!("Unbanned user {user_id}"))
}

pub async fn status(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Moderate)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let data = ctx.data();

    let status = data.moderation.status(user_id, ctx.now()).await?;
    let mut out = format!(
        "User {user_id}: {:?}, {}/{} warnings",
        status.state,
        status.warnings.len(),
        data.moderation.config().max_warnings
    );
    if let Some(ban) = &status.ban {
        let kind = if ban.automatic { "auto-banned" } else { "banned" };
        out.push_str(&format!("\n{kind} {}: {}", describe_expiry(ban), ban.reason));
    }
    if let Some(mute) = &status.mute {
        out.push_str(&format!(
            "\nmuted until {}: {}",
            mute.expires_at.format("%Y-%m-%d %H:%M UTC"),
            mute.reason
        ));
    }
    Ok(out)
}
