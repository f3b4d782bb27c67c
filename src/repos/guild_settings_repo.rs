use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, GuildId, RoleId};
use serde_json::Value;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, PartialEq)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    /// `None` means announce where the level-up happened.
    pub level_up_channel: Option<ChannelId>,
    pub xp_per_message: i64,
    pub cooldown_seconds: i64,
    pub level_roles: BTreeMap<u32, RoleId>,
    /// A stored `0.0` disables XP in that channel; a missing entry means `1.0`.
    pub channel_multipliers: BTreeMap<ChannelId, f64>,
}

impl GuildSettings {
    pub fn multiplier_for(&self, channel_id: ChannelId) -> f64 {
        self.channel_multipliers
            .get(&channel_id)
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(FromRow)]
struct SettingsRow {
    level_up_channel_id: Option<String>,
    xp_per_message: i64,
    cooldown_seconds: i64,
    level_roles: String,
    channel_multipliers: String,
}

#[derive(Clone)]
pub struct GuildSettingsRepo<'a> {
    db: &'a Db,
}

impl<'a> GuildSettingsRepo<'a> {
    pub fn new(db: &'a Db) -> Self { Self { db } }

    /// Settings for the guild, inserting the default row on first access.
    pub async fn get(&self, guild_id: &GuildId) -> Result<GuildSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            INSERT INTO guild_settings (guild_id) VALUES (?)
            ON CONFLICT(guild_id) DO UPDATE SET guild_id = excluded.guild_id
            RETURNING level_up_channel_id, xp_per_message, cooldown_seconds,
                      level_roles, channel_multipliers
            "#,
        )
        .bind(guild_id.to_string())
        .fetch_one(&self.db.pool)
        .await?;

        Ok(GuildSettings {
            guild_id: *guild_id,
            level_up_channel: row
                .level_up_channel_id
                .as_deref()
                .and_then(parse_snowflake)
                .map(ChannelId::new),
            xp_per_message: row.xp_per_message,
            cooldown_seconds: row.cooldown_seconds,
            level_roles: decode_level_roles(&row.level_roles)
                .with_context(|| format!("level_roles of guild {guild_id}"))?,
            channel_multipliers: decode_channel_multipliers(&row.channel_multipliers)
                .with_context(|| format!("channel_multipliers of guild {guild_id}"))?,
        })
    }

    /// Ensure row exists (used before updates that must not insert).
    pub async fn ensure_row(&self, guild_id: &GuildId) -> Result<()> {
        sqlx::query(r#"INSERT INTO guild_settings (guild_id) VALUES (?) ON CONFLICT(guild_id) DO NOTHING"#)
            .bind(guild_id.to_string())
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    pub async fn set_level_up_channel(
        &self,
        guild_id: &GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, level_up_channel_id) VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET level_up_channel_id = excluded.level_up_channel_id
            "#,
        )
        .bind(guild_id.to_string())
        .bind(channel.map(|c| c.to_string()))
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    pub async fn set_xp_per_message(&self, guild_id: &GuildId, amount: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, xp_per_message) VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET xp_per_message = excluded.xp_per_message
            "#,
        )
        .bind(guild_id.to_string())
        .bind(amount)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    pub async fn set_cooldown_seconds(&self, guild_id: &GuildId, seconds: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, cooldown_seconds) VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET cooldown_seconds = excluded.cooldown_seconds
            "#,
        )
        .bind(guild_id.to_string())
        .bind(seconds)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Map `level` to `role`, replacing any earlier role for that level.
    pub async fn set_level_role(&self, guild_id: &GuildId, level: u32, role: RoleId) -> Result<()> {
        let key = level.to_string();
        let role = role.to_string();
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, level_roles) VALUES (?, json_object(?, ?))
            ON CONFLICT(guild_id) DO UPDATE
              SET level_roles = json_set(guild_settings.level_roles, ?, ?)
            "#,
        )
        .bind(guild_id.to_string())
        .bind(&key)
        .bind(&role)
        .bind(json_path(&key))
        .bind(&role)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Drop the mapping for `level`, returning the role it pointed at.
    pub async fn remove_level_role(&self, guild_id: &GuildId, level: u32) -> Result<Option<RoleId>> {
        self.ensure_row(guild_id).await?;
        let gid = guild_id.to_string();
        let path = json_path(&level.to_string());

        let mut tx = self.db.pool.begin().await?;
        let existing: Option<String> = sqlx::query_scalar(
            r#"SELECT CAST(json_extract(level_roles, ?) AS TEXT) FROM guild_settings WHERE guild_id = ?"#,
        )
        .bind(&path)
        .bind(&gid)
        .fetch_one(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(r#"UPDATE guild_settings SET level_roles = json_remove(level_roles, ?) WHERE guild_id = ?"#)
            .bind(&path)
            .bind(&gid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(parse_snowflake(&existing).map(RoleId::new))
    }

    /// Store a raw multiplier entry; `0.0` is kept as an explicit entry.
    pub async fn set_channel_multiplier(
        &self,
        guild_id: &GuildId,
        channel: ChannelId,
        multiplier: f64,
    ) -> Result<()> {
        let key = channel.to_string();
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, channel_multipliers) VALUES (?, json_object(?, ?))
            ON CONFLICT(guild_id) DO UPDATE
              SET channel_multipliers = json_set(guild_settings.channel_multipliers, ?, ?)
            "#,
        )
        .bind(guild_id.to_string())
        .bind(&key)
        .bind(multiplier)
        .bind(json_path(&key))
        .bind(multiplier)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Returns `false` when the channel had no entry.
    pub async fn remove_channel_multiplier(&self, guild_id: &GuildId, channel: ChannelId) -> Result<bool> {
        self.ensure_row(guild_id).await?;
        let path = json_path(&channel.to_string());
        let done = sqlx::query(
            r#"
            UPDATE guild_settings
               SET channel_multipliers = json_remove(channel_multipliers, ?)
             WHERE guild_id = ? AND json_type(channel_multipliers, ?) IS NOT NULL
            "#,
        )
        .bind(&path)
        .bind(guild_id.to_string())
        .bind(&path)
        .execute(&self.db.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }
}

fn json_path(key: &str) -> String {
    format!("$.\"{key}\"")
}

fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

fn decode_level_roles(raw: &str) -> Result<BTreeMap<u32, RoleId>> {
    let entries: BTreeMap<String, Value> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .filter_map(|(level, role)| {
            let level = level.parse::<u32>().ok()?;
            let role = match role {
                Value::String(s) => parse_snowflake(&s),
                Value::Number(n) => n.as_u64().filter(|id| *id != 0),
                _ => None,
            }?;
            Some((level, RoleId::new(role)))
        })
        .collect())
}

fn decode_channel_multipliers(raw: &str) -> Result<BTreeMap<ChannelId, f64>> {
    let entries: BTreeMap<String, Value> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .filter_map(|(channel, multiplier)| {
            let channel = parse_snowflake(&channel)?;
            Some((ChannelId::new(channel), multiplier.as_f64()?))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn guild() -> GuildId {
        GuildId::new(42)
    }

    #[tokio::test]
    async fn get_materializes_defaults_once() {
        let db = test_db().await;
        let repo = GuildSettingsRepo::new(&db);

        let first = repo.get(&guild()).await.unwrap();
        assert_eq!(
            first,
            GuildSettings {
                guild_id: guild(),
                level_up_channel: None,
                xp_per_message: 15,
                cooldown_seconds: 60,
                level_roles: BTreeMap::new(),
                channel_multipliers: BTreeMap::new(),
            }
        );

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM guild_settings")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        repo.get(&guild()).await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM guild_settings")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn scalar_setters_leave_other_fields_alone() {
        let db = test_db().await;
        let repo = GuildSettingsRepo::new(&db);

        repo.set_xp_per_message(&guild(), 40).await.unwrap();
        repo.set_cooldown_seconds(&guild(), 5).await.unwrap();
        repo.set_level_up_channel(&guild(), Some(ChannelId::new(7))).await.unwrap();

        let s = repo.get(&guild()).await.unwrap();
        assert_eq!(s.xp_per_message, 40);
        assert_eq!(s.cooldown_seconds, 5);
        assert_eq!(s.level_up_channel, Some(ChannelId::new(7)));

        repo.set_level_up_channel(&guild(), None).await.unwrap();
        let s = repo.get(&guild()).await.unwrap();
        assert_eq!(s.level_up_channel, None);
        assert_eq!(s.xp_per_message, 40);
    }

    #[tokio::test]
    async fn level_roles_overwrite_and_remove() {
        let db = test_db().await;
        let repo = GuildSettingsRepo::new(&db);

        repo.set_level_role(&guild(), 5, RoleId::new(500)).await.unwrap();
        repo.set_level_role(&guild(), 10, RoleId::new(1000)).await.unwrap();
        repo.set_level_role(&guild(), 5, RoleId::new(555)).await.unwrap();

        let s = repo.get(&guild()).await.unwrap();
        assert_eq!(s.level_roles.len(), 2);
        assert_eq!(s.level_roles.get(&5), Some(&RoleId::new(555)));

        let removed = repo.remove_level_role(&guild(), 5).await.unwrap();
        assert_eq!(removed, Some(RoleId::new(555)));
        assert_eq!(repo.remove_level_role(&guild(), 5).await.unwrap(), None);

        let s = repo.get(&guild()).await.unwrap();
        assert_eq!(s.level_roles.keys().copied().collect::<Vec<_>>(), vec![10]);
    }

    #[tokio::test]
    async fn zero_multiplier_is_an_explicit_entry() {
        let db = test_db().await;
        let repo = GuildSettingsRepo::new(&db);
        let quiet = ChannelId::new(11);
        let busy = ChannelId::new(12);

        repo.set_channel_multiplier(&guild(), quiet, 0.0).await.unwrap();
        repo.set_channel_multiplier(&guild(), busy, 2.5).await.unwrap();

        let s = repo.get(&guild()).await.unwrap();
        assert_eq!(s.channel_multipliers.get(&quiet), Some(&0.0));
        assert_eq!(s.multiplier_for(quiet), 0.0);
        assert_eq!(s.multiplier_for(busy), 2.5);
        assert_eq!(s.multiplier_for(ChannelId::new(13)), 1.0);

        assert!(repo.remove_channel_multiplier(&guild(), quiet).await.unwrap());
        assert!(!repo.remove_channel_multiplier(&guild(), quiet).await.unwrap());

        let s = repo.get(&guild()).await.unwrap();
        assert!(!s.channel_multipliers.contains_key(&quiet));
        assert_eq!(s.multiplier_for(quiet), 1.0);
    }

    #[test]
    fn decode_skips_malformed_entries() {
        let roles = decode_level_roles(r#"{"3":"30","x":"1","4":0,"5":77}"#).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles.get(&5), Some(&RoleId::new(77)));

        let mults = decode_channel_multipliers(r#"{"9":1.5,"0":2.0,"8":"fast"}"#).unwrap();
        assert_eq!(mults.len(), 1);
        assert_eq!(mults.get(&ChannelId::new(9)), Some(&1.5));
    }
}
