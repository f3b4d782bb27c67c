use anyhow::Result;
use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, GuildId, Message, RoleId, UserId};

use crate::db::Db;
use crate::leveling::config::{MULTIPLIER_RANGE, XP_PER_MESSAGE_RANGE};
use crate::leveling::curve;
use crate::leveling::gateway::Gateway;
use crate::repos::{GuildSettings, GuildSettingsRepo, ProgressRepo, UserProgress};
use crate::state::AwardLocks;

/// The slice of an inbound message the award path looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageEvent {
    pub author_id: UserId,
    pub is_bot: bool,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    /// Epoch seconds.
    pub timestamp: i64,
}

impl From<&Message> for MessageEvent {
    fn from(msg: &Message) -> Self {
        Self {
            author_id: msg.author.id,
            is_bot: msg.author.bot,
            guild_id: msg.guild_id,
            channel_id: msg.channel_id,
            timestamp: msg.timestamp.unix_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AwardOutcome {
    /// Bot author or direct message.
    Ignored,
    CoolingDown { retry_in: i64 },
    Granted { xp_added: i64, xp: i64, level: i64 },
    LeveledUp {
        xp_added: i64,
        xp: i64,
        from: i64,
        to: i64,
        /// Where the announcement landed, if anywhere.
        announced_in: Option<ChannelId>,
        role_granted: Option<RoleId>,
    },
}

pub fn level_up_message(user_id: UserId, level: i64) -> String {
    format!(
        "🎉 Congratulations <@{}>, you have reached **Level {level}**! 🎉",
        user_id.get()
    )
}

/// `floor(base * multiplier)`, with both inputs clamped to their configurable ranges.
pub fn xp_delta(xp_per_message: i64, multiplier: f64) -> i64 {
    let base = xp_per_message.clamp(*XP_PER_MESSAGE_RANGE.start(), *XP_PER_MESSAGE_RANGE.end());
    let multiplier = if multiplier.is_finite() {
        multiplier.clamp(*MULTIPLIER_RANGE.start(), *MULTIPLIER_RANGE.end())
    } else {
        1.0
    };
    (base as f64 * multiplier).floor() as i64
}

pub struct AwardEngine<'a, G: Gateway + ?Sized> {
    db: &'a Db,
    locks: &'a AwardLocks,
    gateway: &'a G,
}

impl<'a, G: Gateway + ?Sized> AwardEngine<'a, G> {
    pub fn new(db: &'a Db, locks: &'a AwardLocks, gateway: &'a G) -> Self {
        Self { db, locks, gateway }
    }

    /// Run one message through cooldown, XP grant and level-up.
    ///
    /// Progress is committed before any announcement or role grant is tried,
    /// and neither side effect can fail this call.
    pub async fn process(&self, event: &MessageEvent) -> Result<AwardOutcome> {
        if event.is_bot {
            return Ok(AwardOutcome::Ignored);
        }
        let Some(guild_id) = event.guild_id else {
            return Ok(AwardOutcome::Ignored);
        };

        let settings = GuildSettingsRepo::new(self.db).get(&guild_id).await?;
        let xp_added = xp_delta(settings.xp_per_message, settings.multiplier_for(event.channel_id));

        let guard = self.locks.lock(guild_id, event.author_id).await;
        let progress_repo = ProgressRepo::new(self.db);
        let (current, created) = progress_repo.get_or_init(event.author_id, guild_id).await?;

        // A row created just now has never been awarded, so nothing to cool down from.
        let elapsed = event.timestamp - current.last_award_ts;
        if !created && elapsed < settings.cooldown_seconds {
            tracing::debug!(
                "cooldown: user {} in guild {guild_id} ({elapsed}s of {}s)",
                event.author_id,
                settings.cooldown_seconds
            );
            return Ok(AwardOutcome::CoolingDown {
                retry_in: settings.cooldown_seconds - elapsed,
            });
        }

        let mut next = UserProgress {
            xp: current.xp + xp_added,
            level: current.level,
            last_award_ts: event.timestamp,
        };
        progress_repo.upsert(event.author_id, guild_id, &next).await?;

        let new_level = curve::level_after(current.level, next.xp);
        if new_level <= current.level {
            tracing::debug!(
                "granted {xp_added} xp to user {} in guild {guild_id} (total {})",
                event.author_id,
                next.xp
            );
            return Ok(AwardOutcome::Granted {
                xp_added,
                xp: next.xp,
                level: current.level,
            });
        }

        next.level = new_level;
        progress_repo.upsert(event.author_id, guild_id, &next).await?;
        drop(guard);

        tracing::info!(
            "user {} leveled up {} -> {new_level} in guild {guild_id} (xp {})",
            event.author_id,
            current.level,
            next.xp
        );

        let announced_in = self.announce(&settings, event, new_level).await;
        let role_granted = self.grant_level_role(&settings, event.author_id, new_level).await;

        Ok(AwardOutcome::LeveledUp {
            xp_added,
            xp: next.xp,
            from: current.level,
            to: new_level,
            announced_in,
            role_granted,
        })
    }

    /// Post in the configured channel, falling back to where the message was sent.
    async fn announce(
        &self,
        settings: &GuildSettings,
        event: &MessageEvent,
        level: i64,
    ) -> Option<ChannelId> {
        let text = level_up_message(event.author_id, level);

        if let Some(configured) = settings.level_up_channel {
            match self.gateway.resolve_channel(settings.guild_id, configured).await {
                Some(channel) => match self.gateway.send_message(channel, &text).await {
                    Ok(()) => return Some(channel),
                    Err(e) => {
                        tracing::warn!(
                            "could not announce in {configured} for guild {}: {e}",
                            settings.guild_id
                        );
                        let text = format!("{text} (Couldn't send to configured channel.)");
                        return self.send_logged(event.channel_id, &text).await;
                    }
                },
                None => tracing::warn!(
                    "level-up channel {configured} not found in guild {}",
                    settings.guild_id
                ),
            }
        }

        self.send_logged(event.channel_id, &text).await
    }

    async fn send_logged(&self, channel_id: ChannelId, text: &str) -> Option<ChannelId> {
        match self.gateway.send_message(channel_id, text).await {
            Ok(()) => Some(channel_id),
            Err(e) => {
                tracing::warn!("could not announce level-up in {channel_id}: {e}");
                None
            }
        }
    }

    async fn grant_level_role(
        &self,
        settings: &GuildSettings,
        user_id: UserId,
        level: i64,
    ) -> Option<RoleId> {
        let role_id = *settings.level_roles.get(&u32::try_from(level).ok()?)?;
        let guild_id = settings.guild_id;

        let Some(role) = self.gateway.resolve_role(guild_id, role_id).await else {
            tracing::warn!("role {role_id} for level {level} no longer exists in guild {guild_id}");
            return None;
        };

        let reason = format!("Reached Level {level}");
        match self.gateway.grant_role(guild_id, user_id, role.id, &reason).await {
            Ok(()) => {
                tracing::info!("gave role {} to user {user_id} for level {level}", role.id);
                Some(role.id)
            }
            Err(e) => {
                tracing::warn!("could not give role {} to user {user_id}: {e}", role.id);
                None
            }
        }
    }
}
