use anyhow::Result;
use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, GuildId, RoleId, UserId};

use crate::db::Db;
use crate::leveling::curve::threshold_for;
use crate::repos::{GuildSettings, GuildSettingsRepo, LeaderboardEntry, ProgressRepo};

pub const LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RankCard {
    pub xp: i64,
    pub level: i64,
    pub rank: i64,
    pub total_ranked: i64,
    pub next_level_threshold: i64,
    /// XP past `threshold_for(level)`; negative until the level-0 band's base of 100 is reached.
    pub current_level_xp: i64,
    pub needed_for_next: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankQuery {
    Unranked,
    Ranked(RankCard),
}

/// Read-only projection of the guild's settings, maps already sorted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub level_up_channel: Option<ChannelId>,
    pub xp_per_message: i64,
    pub cooldown_seconds: i64,
    /// Ascending by level.
    pub level_roles: Vec<(u32, RoleId)>,
    /// Descending by multiplier, then ascending by channel.
    pub channel_multipliers: Vec<(ChannelId, f64)>,
}

impl From<&GuildSettings> for SettingsView {
    fn from(s: &GuildSettings) -> Self {
        let mut channel_multipliers: Vec<(ChannelId, f64)> =
            s.channel_multipliers.iter().map(|(c, m)| (*c, *m)).collect();
        channel_multipliers.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Self {
            level_up_channel: s.level_up_channel,
            xp_per_message: s.xp_per_message,
            cooldown_seconds: s.cooldown_seconds,
            level_roles: s.level_roles.iter().map(|(l, r)| (*l, *r)).collect(),
            channel_multipliers,
        }
    }
}

/// Progress inside the current level band: `(current_level_xp, needed_for_next, percentage)`.
pub fn band_progress(xp: i64, level: i64) -> (i64, i64, f64) {
    let floor = threshold_for(level);
    let current = xp - floor;
    let needed = threshold_for(level + 1) - floor;
    let percentage = if needed == 0 {
        0.0
    } else {
        current as f64 / needed as f64 * 100.0
    };
    (current, needed, percentage)
}

/// `▓`/`░` bar of `width` cells; out-of-band values clamp to empty or full.
pub fn progress_bar(current: i64, needed: i64, width: usize) -> String {
    let filled = if needed > 0 {
        let ratio = (current as f64 / needed as f64).clamp(0.0, 1.0);
        ((width as f64) * ratio).floor() as usize
    } else {
        0
    };
    let mut bar = "▓".repeat(filled);
    bar.push_str(&"░".repeat(width - filled));
    bar
}

pub struct LevelQueries<'a> {
    db: &'a Db,
}

impl<'a> LevelQueries<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub async fn rank(&self, guild_id: GuildId, user_id: UserId) -> Result<RankQuery> {
        let repo = ProgressRepo::new(self.db);
        let Some(progress) = repo.get(user_id, guild_id).await? else {
            return Ok(RankQuery::Unranked);
        };
        if progress.xp == 0 {
            return Ok(RankQuery::Unranked);
        }

        let rank = repo.rank_of(guild_id, progress.xp).await?;
        let total_ranked = repo.count_ranked(guild_id).await?;
        let (current_level_xp, needed_for_next, percentage) =
            band_progress(progress.xp, progress.level);

        Ok(RankQuery::Ranked(RankCard {
            xp: progress.xp,
            level: progress.level,
            rank,
            total_ranked,
            next_level_threshold: threshold_for(progress.level + 1),
            current_level_xp,
            needed_for_next,
            percentage,
        }))
    }

    /// Empty when nobody in the guild has XP yet.
    pub async fn leaderboard(&self, guild_id: GuildId) -> Result<Vec<LeaderboardEntry>> {
        ProgressRepo::new(self.db).top(guild_id, LEADERBOARD_SIZE).await
    }

    pub async fn settings(&self, guild_id: GuildId) -> Result<SettingsView> {
        let settings = GuildSettingsRepo::new(self.db).get(&guild_id).await?;
        Ok(SettingsView::from(&settings))
    }
}
