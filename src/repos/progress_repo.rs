use anyhow::Result;
use poise::serenity_prelude as serenity;
use serenity::all::{GuildId, UserId};
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct UserProgress {
    pub xp: i64,
    pub level: i64,
    /// Epoch seconds of the last XP-granting message.
    pub last_award_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub xp: i64,
    pub level: i64,
}

#[derive(FromRow)]
struct LeaderboardRow {
    user_id: String,
    xp: i64,
    level: i64,
}

#[derive(Clone)]
pub struct ProgressRepo<'a> {
    db: &'a Db,
}

impl<'a> ProgressRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    // ---------- writes ----------

    /// Fetch the record, creating a zeroed one if the member has none yet.
    /// The flag is `true` when this call created the row.
    pub async fn get_or_init(
        &self,
        user_id: UserId,
        guild_id: GuildId,
    ) -> Result<(UserProgress, bool)> {
        let created = sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, guild_id, xp, level, last_award_ts)
            VALUES (?, ?, 0, 0, 0)
            ON CONFLICT(user_id, guild_id) DO NOTHING
            "#,
        )
        .bind(user_id.to_string())
        .bind(guild_id.to_string())
        .execute(&self.db.pool)
        .await?
        .rows_affected()
            > 0;

        let progress = self.get(user_id, guild_id).await?.unwrap_or_default();
        Ok((progress, created))
    }

    /// Replace the whole record.
    pub async fn upsert(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        progress: &UserProgress,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, guild_id, xp, level, last_award_ts)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
              xp = excluded.xp,
              level = excluded.level,
              last_award_ts = excluded.last_award_ts
            "#,
        )
        .bind(user_id.to_string())
        .bind(guild_id.to_string())
        .bind(progress.xp)
        .bind(progress.level)
        .bind(progress.last_award_ts)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    // ---------- reads ----------

    pub async fn get(&self, user_id: UserId, guild_id: GuildId) -> Result<Option<UserProgress>> {
        let row = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT xp, level, last_award_ts
            FROM user_progress
            WHERE user_id = ? AND guild_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(guild_id.to_string())
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    /// 1 + number of members in the guild with strictly more XP.
    pub async fn rank_of(&self, guild_id: GuildId, xp: i64) -> Result<i64> {
        let ahead: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM user_progress WHERE guild_id = ? AND xp > ?"#,
        )
        .bind(guild_id.to_string())
        .bind(xp)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(ahead + 1)
    }

    /// Members with any XP at all.
    pub async fn count_ranked(&self, guild_id: GuildId) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM user_progress WHERE guild_id = ? AND xp > 0"#,
        )
        .bind(guild_id.to_string())
        .fetch_one(&self.db.pool)
        .await?;
        Ok(n)
    }

    /// Highest XP first; equal XP is ordered by user id.
    pub async fn top(&self, guild_id: GuildId, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT user_id, xp, level
            FROM user_progress
            WHERE guild_id = ? AND xp > 0
            ORDER BY xp DESC, CAST(user_id AS INTEGER) ASC
            LIMIT ?
            "#,
        )
        .bind(guild_id.to_string())
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let id = r.user_id.parse::<u64>().ok().filter(|id| *id != 0)?;
                Some(LeaderboardEntry {
                    user_id: UserId::new(id),
                    xp: r.xp,
                    level: r.level,
                })
            })
            .collect())
    }
}
