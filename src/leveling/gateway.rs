use std::collections::HashMap;

use async_trait::async_trait;
use serenity::all::{Channel, ChannelId, GuildId, Role, RoleId, UserId};
use serenity::http::HttpError;
use serenity::prelude::Context;
use thiserror::Error;

/// What the leveling core needs to know about a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub position: u16,
    /// Owned by an integration (bot role, booster role, ...).
    pub managed: bool,
    pub is_everyone: bool,
}

impl From<&Role> for RoleInfo {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            position: role.position,
            managed: role.managed,
            is_everyone: role.id.get() == role.guild_id.get(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing permissions: {0}")]
    Permission(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// 403 means the bot lacks a permission; any other status is a transport failure.
    fn from_status(status: Option<u16>, detail: String) -> Self {
        match status {
            Some(403) => Self::Permission(detail),
            _ => Self::Transport(detail),
        }
    }
}

impl From<serenity::Error> for GatewayError {
    fn from(err: serenity::Error) -> Self {
        let status = match &err {
            serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
                Some(resp.status_code.as_u16())
            }
            _ => None,
        };
        Self::from_status(status, err.to_string())
    }
}

/// The chat-platform operations the award path and config commands rely on.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<(), GatewayError>;

    /// `Some` only if the channel exists and belongs to `guild_id`.
    async fn resolve_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelId>;

    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> Option<RoleInfo>;

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Position of the bot's highest role in the guild.
    async fn highest_bot_role(&self, guild_id: GuildId) -> Option<u16>;
}

/// Cache first, HTTP when the cache has nothing.
pub struct SerenityGateway<'a> {
    ctx: &'a Context,
}

impl<'a> SerenityGateway<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Gateway for SerenityGateway<'_> {
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<(), GatewayError> {
        channel_id.say(self.ctx, text).await?;
        Ok(())
    }

    async fn resolve_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelId> {
        let cached = self
            .ctx
            .cache
            .guild(guild_id)
            .map(|g| g.channels.contains_key(&channel_id));
        if cached == Some(true) {
            return Some(channel_id);
        }

        match channel_id.to_channel(self.ctx).await {
            Ok(Channel::Guild(channel)) if channel.guild_id == guild_id => Some(channel_id),
            _ => None,
        }
    }

    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> Option<RoleInfo> {
        let cached = self
            .ctx
            .cache
            .guild(guild_id)
            .and_then(|g| g.roles.get(&role_id).map(RoleInfo::from));
        if cached.is_some() {
            return cached;
        }

        let roles = guild_id.roles(self.ctx).await.ok()?;
        roles.get(&role_id).map(RoleInfo::from)
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.ctx
            .http
            .add_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        Ok(())
    }

    async fn highest_bot_role(&self, guild_id: GuildId) -> Option<u16> {
        let bot_id = self.ctx.cache.current_user().id;

        let cached = self.ctx.cache.guild(guild_id).and_then(|g| {
            let me = g.members.get(&bot_id)?;
            Some(top_position(&me.roles, &g.roles))
        });
        if cached.is_some() {
            return cached;
        }

        let member = guild_id.member(self.ctx, bot_id).await.ok()?;
        let roles = guild_id.roles(self.ctx).await.ok()?;
        Some(top_position(&member.roles, &roles))
    }
}

/// A member with no roles sits at @everyone, position 0.
fn top_position(member_roles: &[RoleId], roles: &HashMap<RoleId, Role>) -> u16 {
    member_roles
        .iter()
        .filter_map(|id| roles.get(id))
        .map(|r| r.position)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// Records every outbound call; failures are opt-in per channel / globally for grants.
    #[derive(Default)]
    pub struct RecordingGateway {
        pub channels: HashSet<ChannelId>,
        pub failing_channels: HashSet<ChannelId>,
        pub roles: HashMap<RoleId, RoleInfo>,
        pub fail_grants: bool,
        pub bot_top: Option<u16>,
        pub sent: Mutex<Vec<(ChannelId, String)>>,
        pub granted: Mutex<Vec<(UserId, RoleId, String)>>,
    }

    impl RecordingGateway {
        pub fn with_channel(mut self, channel: u64) -> Self {
            self.channels.insert(ChannelId::new(channel));
            self
        }

        pub fn with_failing_channel(mut self, channel: u64) -> Self {
            self.channels.insert(ChannelId::new(channel));
            self.failing_channels.insert(ChannelId::new(channel));
            self
        }

        pub fn with_role(mut self, role: u64, position: u16) -> Self {
            let id = RoleId::new(role);
            self.roles.insert(
                id,
                RoleInfo {
                    id,
                    position,
                    managed: false,
                    is_everyone: false,
                },
            );
            self
        }

        pub fn sent(&self) -> Vec<(ChannelId, String)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn granted(&self) -> Vec<(UserId, RoleId, String)> {
            self.granted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<(), GatewayError> {
            if self.failing_channels.contains(&channel_id) {
                return Err(GatewayError::Permission(format!("cannot post in {channel_id}")));
            }
            self.sent.lock().unwrap().push((channel_id, text.to_string()));
            Ok(())
        }

        async fn resolve_channel(&self, _guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelId> {
            self.channels.contains(&channel_id).then_some(channel_id)
        }

        async fn resolve_role(&self, _guild_id: GuildId, role_id: RoleId) -> Option<RoleInfo> {
            self.roles.get(&role_id).copied()
        }

        async fn grant_role(
            &self,
            _guild_id: GuildId,
            user_id: UserId,
            role_id: RoleId,
            reason: &str,
        ) -> Result<(), GatewayError> {
            if self.fail_grants {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            self.granted
                .lock()
                .unwrap()
                .push((user_id, role_id, reason.to_string()));
            Ok(())
        }

        async fn highest_bot_role(&self, _guild_id: GuildId) -> Option<u16> {
            self.bot_top
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: u64 = 4000;

    fn role(id: u64, position: u16, managed: bool) -> Role {
        serde_json::from_value(serde_json::json!({
            "id": id.to_string(),
            "guild_id": GUILD.to_string(),
            "color": 0,
            "hoist": false,
            "managed": managed,
            "mentionable": false,
            "name": format!("role-{id}"),
            "permissions": "0",
            "position": position,
            "icon": null,
            "unicode_emoji": null,
            "tags": {},
            "flags": 0,
        }))
        .unwrap()
    }

    fn roles(list: &[Role]) -> HashMap<RoleId, Role> {
        list.iter().map(|r| (r.id, r.clone())).collect()
    }

    #[test]
    fn everyone_role_shares_the_guild_id() {
        let everyone = RoleInfo::from(&role(GUILD, 0, false));
        assert!(everyone.is_everyone);
        assert!(!everyone.managed);
        assert_eq!(everyone.id, RoleId::new(GUILD));

        let regular = RoleInfo::from(&role(41, 3, false));
        assert!(!regular.is_everyone);
        assert_eq!(regular.position, 3);
    }

    #[test]
    fn integration_roles_are_marked_managed() {
        let info = RoleInfo::from(&role(77, 6, true));
        assert!(info.managed);
        assert!(!info.is_everyone);
    }

    #[test]
    fn top_position_picks_the_highest_held_role() {
        let all = roles(&[role(1, 2, false), role(2, 9, false), role(3, 5, false)]);
        let held = [RoleId::new(1), RoleId::new(3)];
        assert_eq!(top_position(&held, &all), 5);
        assert_eq!(top_position(&[RoleId::new(2)], &all), 9);
    }

    #[test]
    fn top_position_without_roles_is_zero() {
        let all = roles(&[role(1, 2, false)]);
        assert_eq!(top_position(&[], &all), 0);
        // Roles missing from the guild map are ignored.
        assert_eq!(top_position(&[RoleId::new(99)], &all), 0);
    }

    #[test]
    fn forbidden_is_a_permission_error() {
        assert!(matches!(
            GatewayError::from_status(Some(403), "Missing Access".into()),
            GatewayError::Permission(_)
        ));
        assert!(matches!(
            GatewayError::from_status(Some(404), "Unknown Channel".into()),
            GatewayError::Transport(_)
        ));
        assert!(matches!(
            GatewayError::from_status(None, "connection reset".into()),
            GatewayError::Transport(_)
        ));
    }
}
