// Console commands for the leveling system.
//
// Pattern: check the capability, parse primitives, call the core service,
// format the result. No business logic lives here.

use super::{arg, Context, Error};
use crate::core::leveling::{title_for_level, AwardResult, ExperienceChange};
use crate::core::moderation::{format_duration, parse_duration};
use crate::core::notify::Notification;
use crate::core::permissions::Capability;

const MAX_LEADERBOARD: usize = 25;

/// A chat message: banned or muted users are ignored, filtered words are
/// removed, everything else may earn XP.
pub async fn message(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Participate)?;
    let data = ctx.data();
    let user_id = ctx.author();
    let text = args.join(" ");

    if data.moderation.is_banned(user_id, ctx.now()).await? {
        return Ok("ignored: user is banned".to_string());
    }
    if data.moderation.is_muted(user_id, ctx.now()).await? {
        return Ok("dropped: user is muted".to_string());
    }
    if let Some(word) = data.filter.check(&text).await? {
        data.notifier
            .notify(Notification::MessageFiltered {
                user_id,
                word: word.clone(),
            })
            .await;
        return Ok(format!("message removed: contains '{word}'"));
    }

    match data.leveling.on_activity(user_id, ctx.now()).await? {
        AwardResult::Skipped { remaining } => Ok(format!(
            "no XP: cooldown {}s remaining",
            remaining.num_seconds()
        )),
        AwardResult::Awarded(award) => {
            if let Some(event) = award.level_up {
                let title = title_for_level(event.new_level);
                data.notifier
                    .notify(Notification::LevelUp { event, title })
                    .await;
            }
            Ok(format!(
                "+{} XP ({} total, level {})",
                award.amount, award.experience, award.level
            ))
        }
    }
}

pub async fn profile(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Participate)?;
    let user_id = match args.first() {
        Some(_) => arg(args, 0, "user")?,
        None => ctx.author(),
    };

    let profile = ctx.data().leveling.profile(user_id, ctx.now()).await?;
    let progress = &profile.progress;
    let span = profile.progress_in_level + profile.needed_for_next_level;
    let fraction = profile.progress_in_level as f64 / span.max(1) as f64;

    let mut out = format!(
        "User {} | {} | level {} | {} XP\n{} {}/{} XP to level {}",
        progress.user_id,
        profile.title,
        progress.level,
        progress.experience,
        build_progress_bar(fraction, 18),
        profile.progress_in_level,
        span,
        progress.level + 1,
    );
    if (profile.effective_multiplier - 1.0).abs() > f64::EPSILON {
        out.push_str(&format!("\nXP multiplier: x{}", profile.effective_multiplier));
    }
    if let Some((title, levels)) = profile.next_title {
        out.push_str(&format!("\nNext title: {title} in {levels} level(s)"));
    }
    if progress.stickers_unlocked {
        out.push_str("\nStickers unlocked");
    }
    Ok(out)
}

pub async fn top(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Participate)?;
    let limit: usize = match args.first() {
        Some(_) => arg(args, 0, "limit")?,
        None => 10,
    };
    let page: usize = match args.get(1) {
        Some(_) => arg(args, 1, "page")?,
        None => 1,
    };
    let limit = limit.min(MAX_LEADERBOARD);
    let offset = page
        .saturating_sub(1)
        .checked_mul(limit)
        .filter(|offset| offset.checked_add(limit).is_some())
        .ok_or_else(|| format!("invalid <page>: '{page}' is out of range"))?;

    let users = ctx.data().leveling.leaderboard(limit, offset).await?;
    if users.is_empty() {
        return Ok("No ranked users yet.".to_string());
    }

    let lines: Vec<String> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            format!(
                "{:>3}. user {} - level {} ({} XP) {}",
                offset + i + 1,
                user.user_id,
                user.level,
                user.experience,
                title_for_level(user.level)
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn announce_change(ctx: Context<'_>, change: &ExperienceChange) {
    if let Some(event) = change.level_up() {
        let title = title_for_level(event.new_level);
        ctx.data()
            .notifier
            .notify(Notification::LevelUp { event, title })
            .await;
    }
}

pub async fn xp(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Administer)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let delta: i64 = arg(args, 1, "delta")?;

    let change = ctx.data().leveling.modify_experience(user_id, delta).await?;
    announce_change(ctx, &change).await;
    Ok(format!(
        "User {user_id}: {} -> {} XP (level {} -> {})",
        change.old_experience, change.new_experience, change.old_level, change.new_level
    ))
}

pub async fn set_level(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Administer)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let level: i64 = arg(args, 1, "level")?;

    let change = ctx.data().leveling.set_level(user_id, level).await?;
    announce_change(ctx, &change).await;
    Ok(format!(
        "User {user_id} is now level {} ({} XP)",
        change.new_level, change.new_experience
    ))
}

pub async fn multiplier(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Administer)?;
    let user_id: u64 = arg(args, 0, "user")?;
    let value: f64 = arg(args, 1, "value")?;
    let duration = match args.get(2) {
        Some(raw) => Some(parse_duration(raw).ok_or_else(|| format!("invalid duration '{raw}'"))?),
        None => None,
    };
    let expires_at = match duration {
        Some(d) => Some(
            ctx.now()
                .checked_add_signed(d)
                .ok_or("duration is too far in the future")?,
        ),
        None => None,
    };

    ctx.data()
        .leveling
        .set_multiplier(user_id, value, expires_at)
        .await?;
    Ok(match duration {
        Some(d) => format!("User {user_id} earns x{value} XP for {}", format_duration(d)),
        None => format!("User {user_id} earns x{value} XP"),
    })
}

fn build_progress_bar(progress: f64, length: usize) -> String {
    let clamped = progress.clamp(0.0, 1.0);
    let mut filled = (clamped * length as f64).round() as usize;
    if clamped > 0.0 && filled == 0 {
        filled = 1;
    }
    filled = filled.min(length);
    let bar = "#".repeat(filled) + &"-".repeat(length - filled);
    format!("[{}] {}%", bar, (clamped * 100.0).round() as u32)
}
