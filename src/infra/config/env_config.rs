// Process configuration from environment variables (and `.env`).
//
// Every numeric tunable has a `BOT_*` override; anything unset keeps the
// defaults from `LevelingConfig` / `EscalationConfig`.

use crate::core::leveling::LevelingConfig;
use crate::core::moderation::EscalationConfig;
use anyhow::{bail, Context};
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/community_bot.db";

/// Where state lives. `BOT_DATABASE_URL=memory` keeps everything in process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    InMemory,
    Sqlite { url: String },
}

/// How the console frontend prints announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub storage: Storage,
    pub admin_ids: Vec<u64>,
    pub moderator_ids: Vec<u64>,
    pub leveling: LevelingConfig,
    pub escalation: EscalationConfig,
    pub output: OutputFormat,
    /// How often idle locks and stale cooldown entries are dropped
    pub maintenance_secs: u64,
}

impl BotConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. `from_env` is this over `std::env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = LevelingConfig::default();
        let leveling = LevelingConfig {
            xp_min: parse_or(&lookup, "BOT_XP_MIN", defaults.xp_min)?,
            xp_max: parse_or(&lookup, "BOT_XP_MAX", defaults.xp_max)?,
            cooldown_secs: parse_or(&lookup, "BOT_XP_COOLDOWN_SECS", defaults.cooldown_secs)?,
            min_multiplier: parse_or(&lookup, "BOT_MIN_MULTIPLIER", defaults.min_multiplier)?,
            max_multiplier: parse_or(&lookup, "BOT_MAX_MULTIPLIER", defaults.max_multiplier)?,
            max_level: parse_or(&lookup, "BOT_MAX_LEVEL", defaults.max_level)?,
            sticker_unlock_level: parse_or(
                &lookup,
                "BOT_STICKER_UNLOCK_LEVEL",
                defaults.sticker_unlock_level,
            )?,
        };

        let defaults = EscalationConfig::default();
        let escalation = EscalationConfig {
            max_warnings: parse_or(&lookup, "BOT_MAX_WARNINGS", defaults.max_warnings)?,
            autoban_secs: parse_or(&lookup, "BOT_AUTOBAN_SECS", defaults.autoban_secs)?,
            default_ban_secs: parse_or(&lookup, "BOT_DEFAULT_BAN_SECS", defaults.default_ban_secs)?,
            default_mute_secs: parse_or(
                &lookup,
                "BOT_DEFAULT_MUTE_SECS",
                defaults.default_mute_secs,
            )?,
        };

        let output = match lookup("BOT_OUTPUT_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => OutputFormat::Text,
            Some("json") => OutputFormat::Json,
            Some(other) => bail!("BOT_OUTPUT_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        let config = Self {
            storage: match lookup("BOT_DATABASE_URL").as_deref().map(str::trim) {
                None | Some("") => Storage::Sqlite {
                    url: DEFAULT_DATABASE_URL.to_string(),
                },
                Some("memory") => Storage::InMemory,
                Some(url) => Storage::Sqlite {
                    url: url.to_string(),
                },
            },
            admin_ids: parse_ids(&lookup, "BOT_ADMIN_IDS")?,
            moderator_ids: parse_ids(&lookup, "BOT_MODERATOR_IDS")?,
            leveling,
            escalation,
            output,
            maintenance_secs: parse_or(&lookup, "BOT_MAINTENANCE_SECS", 300)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let leveling = &self.leveling;
        if leveling.xp_min > leveling.xp_max {
            bail!(
                "BOT_XP_MIN ({}) must not exceed BOT_XP_MAX ({})",
                leveling.xp_min,
                leveling.xp_max
            );
        }
        if !(leveling.min_multiplier > 0.0 && leveling.min_multiplier <= leveling.max_multiplier)
        {
            bail!(
                "multiplier bounds must be positive and ordered, got {}..={}",
                leveling.min_multiplier,
                leveling.max_multiplier
            );
        }
        if self.escalation.max_warnings == 0 {
            bail!("BOT_MAX_WARNINGS must be at least 1");
        }
        if self.maintenance_secs == 0 {
            bail!("BOT_MAINTENANCE_SECS must be at least 1");
        }
        Ok(())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

/// Comma-separated user ids.
fn parse_ids(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Vec<u64>> {
    let Some(raw) = lookup(key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .with_context(|| format!("{key} contains an invalid user id '{part}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<BotConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(
            config.storage,
            Storage::Sqlite {
                url: DEFAULT_DATABASE_URL.to_string()
            }
        );
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.leveling.xp_max, 20);
        assert_eq!(config.escalation.max_warnings, 3);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config_from(&[
            ("BOT_DATABASE_URL", "sqlite::memory:"),
            ("BOT_ADMIN_IDS", "1, 2,3"),
            ("BOT_MODERATOR_IDS", "10"),
            ("BOT_XP_COOLDOWN_SECS", "60"),
            ("BOT_MAX_WARNINGS", "5"),
            ("BOT_OUTPUT_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            Storage::Sqlite {
                url: "sqlite::memory:".to_string()
            }
        );
        assert_eq!(config.admin_ids, vec![1, 2, 3]);
        assert_eq!(config.moderator_ids, vec![10]);
        assert_eq!(config.leveling.cooldown_secs, 60);
        assert_eq!(config.escalation.max_warnings, 5);
        assert_eq!(config.output, OutputFormat::Json);

        let config = config_from(&[("BOT_DATABASE_URL", "memory")]).unwrap();
        assert_eq!(config.storage, Storage::InMemory);
    }

    #[test]
    fn test_bad_values_name_the_variable() {
        let err = config_from(&[("BOT_XP_MIN", "lots")]).unwrap_err();
        assert!(format!("{err:#}").contains("BOT_XP_MIN"));

        let err = config_from(&[("BOT_ADMIN_IDS", "1,x")]).unwrap_err();
        assert!(format!("{err:#}").contains("BOT_ADMIN_IDS"));
    }

    #[test]
    fn test_inconsistent_values_are_rejected() {
        assert!(config_from(&[("BOT_XP_MIN", "30")]).is_err());
        assert!(config_from(&[("BOT_MIN_MULTIPLIER", "0")]).is_err());
        assert!(config_from(&[("BOT_MAX_WARNINGS", "0")]).is_err());
        assert!(config_from(&[("BOT_OUTPUT_FORMAT", "xml")]).is_err());
    }
}
