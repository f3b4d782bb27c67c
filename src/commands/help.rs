use anyhow::Result;
use poise::CreateReply;
use poise::serenity_prelude as serenity;

use crate::state::Ctx;

const ADMIN_COMMANDS: &str = "\
`show` - View current leveling settings.
`setchannel [channel]` - Set the channel for level-up messages (leave blank to reset).
`setxp <amount>` - Set base XP gained per message (1-1000).
`setcooldown <seconds>` - Set XP gain cooldown (0-3600s).
`addrole <level> <role>` - Assign a role for reaching a level.
`removerole <level>` - Remove role assignment for a level.
`listroles` - List all configured level-to-role assignments.
`setchannelxp <channel> <multiplier>` - Set XP multiplier for a channel (e.g., 1.5 for 1.5x, 0 to disable XP).
`removechannelxp <channel>` - Remove XP multiplier from a channel.
`listchannelxp` - List all channel XP multipliers.";

/// Shows help for the leveling commands.
#[poise::command(slash_command, prefix_command, aliases("lhelp"))]
pub async fn levelhelp(ctx: Ctx<'_>) -> Result<()> {
    let prefix = ctx.prefix();
    let embed = serenity::CreateEmbed::new()
        .title("✨ Leveling System Help ✨")
        .colour(serenity::Colour::TEAL)
        .description("Here are the available commands for the leveling system:")
        .field(
            format!("`{prefix}rank [member]`"),
            "Check your or another member's rank, XP, and level.",
            false,
        )
        .field(
            format!("`{prefix}leaderboard`"),
            "Display the server's top 10 users by XP.",
            false,
        )
        .field(
            "🛠️ Admin Configuration Commands (`/levelconfig`)",
            ADMIN_COMMANDS,
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Use {prefix}command or /command for slash commands."
        )));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
