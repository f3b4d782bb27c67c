use std::ops::RangeInclusive;

use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, GuildId, RoleId};

use crate::db::Db;
use crate::leveling::error::LevelingError;
use crate::leveling::gateway::RoleInfo;
use crate::repos::GuildSettingsRepo;

pub const XP_PER_MESSAGE_RANGE: RangeInclusive<i64> = 1..=1000;
pub const COOLDOWN_RANGE: RangeInclusive<i64> = 0..=3600;
pub const REWARD_LEVEL_RANGE: RangeInclusive<i64> = 1..=1000;
pub const MULTIPLIER_RANGE: RangeInclusive<f64> = 0.0..=10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiplierChange {
    Set(f64),
    /// Stored as an explicit `0.0` entry.
    Disabled,
    /// `1.0` on a channel that had an entry: the entry is gone.
    Reset,
    /// `1.0` on a channel with no entry: nothing to do.
    AlreadyDefault,
}

/// Checks a role before it can become a level reward, so the award path never
/// has to reason about hierarchy.
pub fn validate_reward_role(role: &RoleInfo, bot_top: Option<u16>) -> Result<(), LevelingError> {
    if role.is_everyone {
        return Err(LevelingError::validation(
            "The `@everyone` role cannot be assigned as a level reward.",
        ));
    }
    if role.managed {
        return Err(LevelingError::validation(format!(
            "The role <@&{}> is managed by an integration (bot or booster role) and cannot be assigned.",
            role.id.get()
        )));
    }
    // Equal positions are rejected outright; Discord's id tie-break is not consulted.
    match bot_top {
        Some(top) if role.position < top => Ok(()),
        _ => Err(LevelingError::validation(format!(
            "I cannot assign the role <@&{}> because it is higher than or equal to my highest role. Please adjust my role hierarchy.",
            role.id.get()
        ))),
    }
}

/// Mutations behind `/levelconfig`. Every call validates first and then
/// upserts exactly one field or map entry.
pub struct ConfigService<'a> {
    repo: GuildSettingsRepo<'a>,
}

impl<'a> ConfigService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self {
            repo: GuildSettingsRepo::new(db),
        }
    }

    pub async fn set_level_up_channel(
        &self,
        guild_id: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<(), LevelingError> {
        self.repo.set_level_up_channel(&guild_id, channel).await?;
        Ok(())
    }

    pub async fn set_xp_per_message(&self, guild_id: GuildId, amount: i64) -> Result<(), LevelingError> {
        if !XP_PER_MESSAGE_RANGE.contains(&amount) {
            return Err(LevelingError::validation(format!(
                "XP per message must be between {} and {}.",
                XP_PER_MESSAGE_RANGE.start(),
                XP_PER_MESSAGE_RANGE.end()
            )));
        }
        self.repo.set_xp_per_message(&guild_id, amount).await?;
        Ok(())
    }

    pub async fn set_cooldown(&self, guild_id: GuildId, seconds: i64) -> Result<(), LevelingError> {
        if !COOLDOWN_RANGE.contains(&seconds) {
            return Err(LevelingError::validation(format!(
                "Cooldown must be between {} and {} seconds.",
                COOLDOWN_RANGE.start(),
                COOLDOWN_RANGE.end()
            )));
        }
        self.repo.set_cooldown_seconds(&guild_id, seconds).await?;
        Ok(())
    }

    pub async fn add_level_role(
        &self,
        guild_id: GuildId,
        level: i64,
        role: &RoleInfo,
        bot_top: Option<u16>,
    ) -> Result<(), LevelingError> {
        if !REWARD_LEVEL_RANGE.contains(&level) {
            return Err(LevelingError::validation(format!(
                "Level must be between {} and {}.",
                REWARD_LEVEL_RANGE.start(),
                REWARD_LEVEL_RANGE.end()
            )));
        }
        validate_reward_role(role, bot_top)?;
        let level = u32::try_from(level).map_err(|e| LevelingError::Storage(e.into()))?;
        self.repo.set_level_role(&guild_id, level, role.id).await?;
        Ok(())
    }

    /// Returns the role that was mapped to `level`.
    pub async fn remove_level_role(&self, guild_id: GuildId, level: i64) -> Result<RoleId, LevelingError> {
        let not_found = || LevelingError::not_found(format!("No role is assigned to Level `{level}`."));
        let level = u32::try_from(level).map_err(|_| not_found())?;
        self.repo
            .remove_level_role(&guild_id, level)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn set_channel_multiplier(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        multiplier: f64,
    ) -> Result<MultiplierChange, LevelingError> {
        if !MULTIPLIER_RANGE.contains(&multiplier) {
            return Err(LevelingError::validation(format!(
                "Multiplier must be between {} and {}.",
                MULTIPLIER_RANGE.start(),
                MULTIPLIER_RANGE.end()
            )));
        }

        if multiplier == 1.0 {
            let removed = self.repo.remove_channel_multiplier(&guild_id, channel).await?;
            return Ok(if removed {
                MultiplierChange::Reset
            } else {
                MultiplierChange::AlreadyDefault
            });
        }

        self.repo
            .set_channel_multiplier(&guild_id, channel, multiplier)
            .await?;
        Ok(if multiplier == 0.0 {
            MultiplierChange::Disabled
        } else {
            MultiplierChange::Set(multiplier)
        })
    }

    pub async fn remove_channel_multiplier(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<(), LevelingError> {
        if self.repo.remove_channel_multiplier(&guild_id, channel).await? {
            Ok(())
        } else {
            Err(LevelingError::not_found(format!(
                "No specific XP multiplier is set for <#{}>. It's already using the default rate.",
                channel.get()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn guild() -> GuildId {
        GuildId::new(3)
    }

    fn role(position: u16) -> RoleInfo {
        RoleInfo {
            id: RoleId::new(77),
            position,
            managed: false,
            is_everyone: false,
        }
    }

    #[test]
    fn reward_role_must_sit_below_the_bot() {
        assert!(validate_reward_role(&role(2), Some(5)).is_ok());
        assert!(matches!(
            validate_reward_role(&role(5), Some(5)),
            Err(LevelingError::Validation(_))
        ));
        assert!(validate_reward_role(&role(9), Some(5)).is_err());
        assert!(validate_reward_role(&role(0), None).is_err());
    }

    #[test]
    fn position_tie_with_the_bot_is_rejected_regardless_of_id() {
        for id in [1, u64::MAX] {
            let tied = RoleInfo { id: RoleId::new(id), ..role(7) };
            assert!(matches!(
                validate_reward_role(&tied, Some(7)),
                Err(LevelingError::Validation(_))
            ));
        }
    }

    #[test]
    fn everyone_and_managed_roles_are_rejected() {
        let everyone = RoleInfo { is_everyone: true, ..role(0) };
        let managed = RoleInfo { managed: true, ..role(1) };
        assert!(validate_reward_role(&everyone, Some(10)).is_err());
        assert!(validate_reward_role(&managed, Some(10)).is_err());
    }

    #[tokio::test]
    async fn out_of_range_values_never_reach_the_store() {
        let db = test_db().await;
        let svc = ConfigService::new(&db);

        assert!(matches!(
            svc.set_xp_per_message(guild(), 0).await,
            Err(LevelingError::Validation(_))
        ));
        assert!(svc.set_xp_per_message(guild(), 1001).await.is_err());
        assert!(svc.set_cooldown(guild(), -1).await.is_err());
        assert!(svc.set_cooldown(guild(), 3601).await.is_err());
        assert!(svc
            .set_channel_multiplier(guild(), ChannelId::new(1), 10.5)
            .await
            .is_err());

        let s = GuildSettingsRepo::new(&db).get(&guild()).await.unwrap();
        assert_eq!(s.xp_per_message, 15);
        assert_eq!(s.cooldown_seconds, 60);
        assert!(s.channel_multipliers.is_empty());

        svc.set_xp_per_message(guild(), 1000).await.unwrap();
        svc.set_cooldown(guild(), 0).await.unwrap();
        let s = GuildSettingsRepo::new(&db).get(&guild()).await.unwrap();
        assert_eq!(s.xp_per_message, 1000);
        assert_eq!(s.cooldown_seconds, 0);
    }

    #[tokio::test]
    async fn level_role_add_and_remove() {
        let db = test_db().await;
        let svc = ConfigService::new(&db);

        svc.add_level_role(guild(), 5, &role(1), Some(4)).await.unwrap();
        assert!(svc.add_level_role(guild(), 0, &role(1), Some(4)).await.is_err());
        assert!(svc.add_level_role(guild(), 6, &role(4), Some(4)).await.is_err());

        assert_eq!(svc.remove_level_role(guild(), 5).await.unwrap(), RoleId::new(77));
        assert!(matches!(
            svc.remove_level_role(guild(), 5).await,
            Err(LevelingError::NotFound(_))
        ));
        assert!(matches!(
            svc.remove_level_role(guild(), -3).await,
            Err(LevelingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn multiplier_round_trip() {
        let db = test_db().await;
        let svc = ConfigService::new(&db);
        let repo = GuildSettingsRepo::new(&db);
        let ch = ChannelId::new(50);

        assert_eq!(
            svc.set_channel_multiplier(guild(), ch, 1.0).await.unwrap(),
            MultiplierChange::AlreadyDefault
        );
        assert_eq!(
            svc.set_channel_multiplier(guild(), ch, 0.0).await.unwrap(),
            MultiplierChange::Disabled
        );
        assert_eq!(
            repo.get(&guild()).await.unwrap().channel_multipliers.get(&ch),
            Some(&0.0)
        );

        assert_eq!(
            svc.set_channel_multiplier(guild(), ch, 1.0).await.unwrap(),
            MultiplierChange::Reset
        );
        assert!(repo.get(&guild()).await.unwrap().channel_multipliers.is_empty());

        assert_eq!(
            svc.set_channel_multiplier(guild(), ch, 2.0).await.unwrap(),
            MultiplierChange::Set(2.0)
        );
        svc.remove_channel_multiplier(guild(), ch).await.unwrap();
        assert!(matches!(
            svc.remove_channel_multiplier(guild(), ch).await,
            Err(LevelingError::NotFound(_))
        ));
    }
}
