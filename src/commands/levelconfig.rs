use anyhow::Result;
use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::all::{ChannelId, RoleId};

use crate::commands::{reply_rejection, send_chunked_embeds};
use crate::leveling::{
    ConfigService, Gateway, LevelQueries, MultiplierChange, RoleInfo, SerenityGateway,
    SettingsView,
};
use crate::state::Ctx;

/// `/levelconfig` parent. Prefix invocations without a subcommand show the settings.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    default_member_permissions = "MANAGE_GUILD",
    required_permissions = "MANAGE_GUILD",
    subcommands(
        "levelconfig_show",
        "levelconfig_setchannel",
        "levelconfig_setxp",
        "levelconfig_setcooldown",
        "levelconfig_addrole",
        "levelconfig_removerole",
        "levelconfig_listroles",
        "levelconfig_setchannelxp",
        "levelconfig_removechannelxp",
        "levelconfig_listchannelxp"
    )
)]
pub async fn levelconfig(ctx: Ctx<'_>) -> Result<()> {
    show(ctx).await
}

/// View the current leveling settings.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "show"
)]
pub async fn levelconfig_show(ctx: Ctx<'_>) -> Result<()> {
    show(ctx).await
}

async fn show(ctx: Ctx<'_>) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let view = LevelQueries::new(&ctx.data().db).settings(gid).await?;
    let guild_name = guild_name(ctx);

    let channel = view
        .level_up_channel
        .map(|c| format!("<#{}>", c.get()))
        .unwrap_or_else(|| "Not Set (Defaults to the channel where the user levels up)".to_string());

    let roles = if view.level_roles.is_empty() {
        "No level roles configured.".to_string()
    } else {
        level_role_lines(ctx, &view).join("\n")
    };
    let multipliers = if view.channel_multipliers.is_empty() {
        "No channel-specific XP multipliers configured.".to_string()
    } else {
        multiplier_lines(ctx, &view).join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("Leveling Configuration for {guild_name}"))
        .colour(serenity::Colour::ORANGE)
        .field("📢 Level Up Channel", channel, false)
        .field(
            "✨ Base XP Per Message",
            format!("`{}` XP", view.xp_per_message),
            true,
        )
        .field(
            "⏱️ Cooldown",
            format!("`{}` seconds", view.cooldown_seconds),
            true,
        )
        .field("🏅 Level Roles", truncate_field(roles), false)
        .field("💸 Channel XP Multipliers", truncate_field(multipliers), false)
        .footer(serenity::CreateEmbedFooter::new(
            "Use /levelconfig <subcommand> to change settings.",
        ));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Set the level-up announcement channel, or reset it when no channel is given.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "setchannel"
)]
pub async fn levelconfig_setchannel(
    ctx: Ctx<'_>,
    #[description = "Channel for level-up announcements (leave empty to reset)"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    let channel_id = channel.map(|c| c.id);
    if let Err(e) = svc.set_level_up_channel(gid, channel_id).await {
        return reply_rejection(ctx, e).await;
    }

    match channel_id {
        Some(ch) => {
            ctx.say(format!(
                "✅ Level up announcements will now be sent to <#{}>.",
                ch.get()
            ))
            .await?
        }
        None => {
            ctx.say("✅ Level up announcements channel has been reset. Announcements will be in the channel where the user levels up.")
                .await?
        }
    };
    Ok(())
}

/// Set the amount of XP gained per message.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "setxp"
)]
pub async fn levelconfig_setxp(
    ctx: Ctx<'_>,
    #[description = "XP per message (1-1000)"]
    #[min = 1]
    #[max = 1000]
    amount: i64,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    match svc.set_xp_per_message(gid, amount).await {
        Ok(()) => {
            ctx.say(format!("✅ XP gained per message set to `{amount}`."))
                .await?;
            Ok(())
        }
        Err(e) => reply_rejection(ctx, e).await,
    }
}

/// Set the cooldown (in seconds) between XP-granting messages.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "setcooldown"
)]
pub async fn levelconfig_setcooldown(
    ctx: Ctx<'_>,
    #[description = "Cooldown in seconds (0-3600)"]
    #[min = 0]
    #[max = 3600]
    seconds: i64,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    match svc.set_cooldown(gid, seconds).await {
        Ok(()) => {
            ctx.say(format!("✅ XP gain cooldown set to `{seconds}` seconds."))
                .await?;
            Ok(())
        }
        Err(e) => reply_rejection(ctx, e).await,
    }
}

/// Give a role to members when they reach a level.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "addrole"
)]
pub async fn levelconfig_addrole(
    ctx: Ctx<'_>,
    #[description = "Level that unlocks the role (1-1000)"]
    #[min = 1]
    #[max = 1000]
    level: i64,
    #[description = "Role to give"] role: serenity::Role,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let bot_top = SerenityGateway::new(ctx.serenity_context())
        .highest_bot_role(gid)
        .await;

    let svc = ConfigService::new(&ctx.data().db);
    match svc
        .add_level_role(gid, level, &RoleInfo::from(&role), bot_top)
        .await
    {
        Ok(()) => {
            ctx.say(format!(
                "✅ Users reaching Level `{level}` will now receive the <@&{}> role.",
                role.id.get()
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_rejection(ctx, e).await,
    }
}

/// Remove the role given at a level.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "removerole"
)]
pub async fn levelconfig_removerole(
    ctx: Ctx<'_>,
    #[description = "Level whose role should be removed"] level: i64,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    match svc.remove_level_role(gid, level).await {
        Ok(role) => {
            ctx.say(format!(
                "✅ Role assignment for Level `{level}` ({}) has been removed.",
                role_label(ctx, role)
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_rejection(ctx, e).await,
    }
}

/// List all level → role rewards.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "listroles"
)]
pub async fn levelconfig_listroles(ctx: Ctx<'_>) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let view = LevelQueries::new(&ctx.data().db).settings(gid).await?;
    if view.level_roles.is_empty() {
        ctx.say("No level roles are currently configured for this server.")
            .await?;
        return Ok(());
    }

    let title = format!("🏅 Configured Level Roles for {}", guild_name(ctx));
    let title_cont = title.clone();
    send_chunked_embeds(
        ctx,
        level_role_lines(ctx, &view),
        move |desc| {
            serenity::CreateEmbed::new()
                .title(title)
                .colour(serenity::Colour::PURPLE)
                .description(desc)
        },
        move |idx, desc| {
            serenity::CreateEmbed::new()
                .title(format!("{title_cont} — cont. #{idx}"))
                .colour(serenity::Colour::PURPLE)
                .description(desc)
        },
    )
    .await
}

/// Set an XP multiplier for a channel (1.5 for 1.5x, 0 to disable XP, 1 to reset).
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "setchannelxp"
)]
pub async fn levelconfig_setchannelxp(
    ctx: Ctx<'_>,
    #[description = "Channel to change"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
    #[description = "Multiplier (0-10)"]
    #[min = 0]
    #[max = 10]
    multiplier: f64,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    let change = match svc.set_channel_multiplier(gid, channel.id, multiplier).await {
        Ok(change) => change,
        Err(e) => return reply_rejection(ctx, e).await,
    };

    let ch = channel.id.get();
    let msg = match change {
        MultiplierChange::Set(m) => format!("✅ XP multiplier for <#{ch}> set to `{m}x`."),
        MultiplierChange::Disabled => {
            format!("✅ XP gain in <#{ch}> has been **disabled** (0x multiplier).")
        }
        MultiplierChange::Reset => {
            format!("✅ XP multiplier for <#{ch}> has been reset to default (1x).")
        }
        MultiplierChange::AlreadyDefault => format!(
            "ℹ️ XP multiplier for <#{ch}> is already at default (1x). No changes made."
        ),
    };
    ctx.say(msg).await?;
    Ok(())
}

/// Remove a channel's XP multiplier, reverting it to the default rate.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "removechannelxp"
)]
pub async fn levelconfig_removechannelxp(
    ctx: Ctx<'_>,
    #[description = "Channel to reset"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let svc = ConfigService::new(&ctx.data().db);
    match svc.remove_channel_multiplier(gid, channel.id).await {
        Ok(()) => {
            ctx.say(format!(
                "✅ XP multiplier for <#{}> has been removed. It will now use the server default XP rate (1x).",
                channel.id.get()
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_rejection(ctx, e).await,
    }
}

/// List all channel XP multipliers.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_GUILD",
    rename = "listchannelxp"
)]
pub async fn levelconfig_listchannelxp(ctx: Ctx<'_>) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("Use this command in a server channel.").await?;
        return Ok(());
    };

    let view = LevelQueries::new(&ctx.data().db).settings(gid).await?;
    if view.channel_multipliers.is_empty() {
        ctx.say("No channel-specific XP multipliers are configured for this server.")
            .await?;
        return Ok(());
    }

    let title = format!("💸 Channel XP Multipliers for {}", guild_name(ctx));
    let title_cont = title.clone();
    send_chunked_embeds(
        ctx,
        multiplier_lines(ctx, &view),
        move |desc| {
            serenity::CreateEmbed::new()
                .title(title)
                .colour(serenity::Colour::DARK_GREEN)
                .description(desc)
        },
        move |idx, desc| {
            serenity::CreateEmbed::new()
                .title(format!("{title_cont} — cont. #{idx}"))
                .colour(serenity::Colour::DARK_GREEN)
                .description(desc)
        },
    )
    .await
}

// ---------- rendering ----------

const MAX_FIELD_CHARS: usize = 1024;

fn guild_name(ctx: Ctx<'_>) -> String {
    ctx.guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| "this server".to_string())
}

fn role_label(ctx: Ctx<'_>, role: RoleId) -> String {
    let exists = ctx
        .guild()
        .map(|g| g.roles.contains_key(&role))
        .unwrap_or(true);
    if exists {
        format!("<@&{}>", role.get())
    } else {
        format!("`Role ID: {} (Not Found)`", role.get())
    }
}

fn channel_label(ctx: Ctx<'_>, channel: ChannelId) -> String {
    let exists = ctx
        .guild()
        .map(|g| g.channels.contains_key(&channel))
        .unwrap_or(true);
    if exists {
        format!("<#{}>", channel.get())
    } else {
        format!("`Channel ID: {} (Not Found)`", channel.get())
    }
}

fn multiplier_label(multiplier: f64) -> String {
    if multiplier == 0.0 {
        "`Disabled (0x)`".to_string()
    } else {
        format!("`{multiplier}x` XP")
    }
}

fn level_role_lines(ctx: Ctx<'_>, view: &SettingsView) -> Vec<String> {
    view.level_roles
        .iter()
        .map(|(level, role)| format!("**Level `{level}`** → {}", role_label(ctx, *role)))
        .collect()
}

fn multiplier_lines(ctx: Ctx<'_>, view: &SettingsView) -> Vec<String> {
    view.channel_multipliers
        .iter()
        .map(|(channel, m)| format!("{}: {}", channel_label(ctx, *channel), multiplier_label(*m)))
        .collect()
}

/// Embed field values cap at 1024 characters.
fn truncate_field(value: String) -> String {
    if value.chars().count() <= MAX_FIELD_CHARS {
        return value;
    }
    let mut out: String = value.chars().take(MAX_FIELD_CHARS - 1).collect();
    out.push('…');
    out
}
