use anyhow::{Context as _, Result};
use poise::serenity_prelude as serenity;
use serenity::all::GuildId;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub command_prefix: String,
    /// Register commands in this guild only (instant updates while developing).
    pub dev_guild_id: Option<GuildId>,
}

impl Config {
    /// Reads the process environment; call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = get("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("Set DISCORD_TOKEN in env")?;

        let dev_guild_id = match get("DEV_GUILD_ID").filter(|v| !v.trim().is_empty()) {
            Some(raw) => {
                let id = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|id| *id != 0)
                    .with_context(|| format!("DEV_GUILD_ID must be a guild id, got {raw:?}"))?;
                Some(GuildId::new(id))
            }
            None => None,
        };

        Ok(Self {
            discord_token,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://leveling.db".into()),
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "!".into()),
            dev_guild_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(cfg.discord_token, "abc");
        assert_eq!(cfg.database_url, "sqlite://leveling.db");
        assert_eq!(cfg.command_prefix, "!");
        assert_eq!(cfg.dev_guild_id, None);
    }

    #[test]
    fn token_is_required() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn dev_guild_must_parse() {
        let cfg = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEV_GUILD_ID", "1429268494687408232"),
            ("COMMAND_PREFIX", "?"),
        ]))
        .unwrap();
        assert_eq!(cfg.dev_guild_id, Some(GuildId::new(1429268494687408232)));
        assert_eq!(cfg.command_prefix, "?");

        let bad = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc"), ("DEV_GUILD_ID", "x")]));
        assert!(bad.is_err());
    }
}
