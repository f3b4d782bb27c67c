use anyhow::Result;
use poise::CreateReply;
use poise::serenity_prelude as serenity;

use crate::commands::with_commas;
use crate::leveling::query::{LEADERBOARD_SIZE, progress_bar};
use crate::leveling::{LevelQueries, RankQuery};
use crate::state::Ctx;

const PROGRESS_BAR_CELLS: usize = 15;

/// Check your (or another member's) level, XP and rank.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn rank(
    ctx: Ctx<'_>,
    #[description = "Member to look up (defaults to you)"] member: Option<serenity::User>,
) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("This command can only be used in a guild.").await?;
        return Ok(());
    };
    let target = member.unwrap_or_else(|| ctx.author().clone());

    let card = match LevelQueries::new(&ctx.data().db).rank(gid, target.id).await? {
        RankQuery::Unranked => {
            ctx.send(
                CreateReply::default()
                    .content(format!(
                        "<@{}> hasn't earned any XP yet or is not ranked.",
                        target.id.get()
                    ))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
        RankQuery::Ranked(card) => card,
    };

    let bar = progress_bar(card.current_level_xp, card.needed_for_next, PROGRESS_BAR_CELLS);
    let embed = serenity::CreateEmbed::new()
        .title(format!("{}'s Leveling Stats", target.display_name()))
        .thumbnail(target.face())
        .field("🏅 Level", format!("`{}`", card.level), true)
        .field(
            "✨ XP",
            format!(
                "`{}/{}`",
                with_commas(card.xp),
                with_commas(card.next_level_threshold)
            ),
            true,
        )
        .field(
            "🏆 Rank",
            format!("`#{}/{}`", card.rank, card.total_ranked),
            true,
        )
        .field(
            format!("Progress to Level {}", card.level + 1),
            format!(
                "`{bar}` `({}/{} XP)` - **{:.2}%**",
                with_commas(card.current_level_xp),
                with_commas(card.needed_for_next),
                card.percentage
            ),
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Requested by {}",
            ctx.author().display_name()
        )));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Shows the server's top 10 members by XP.
#[poise::command(slash_command, prefix_command, guild_only, guild_cooldown = 30)]
pub async fn leaderboard(ctx: Ctx<'_>) -> Result<()> {
    let Some(gid) = ctx.guild_id() else {
        ctx.say("This command can only be used in a guild.").await?;
        return Ok(());
    };

    let entries = LevelQueries::new(&ctx.data().db).leaderboard(gid).await?;
    if entries.is_empty() {
        ctx.send(
            CreateReply::default()
                .content("The leaderboard is currently empty. Get chatting to rank up!")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    // Cache lookups must not live across an await.
    let (guild_name, still_here): (String, Vec<bool>) = match ctx.guild() {
        Some(g) => (
            g.name.clone(),
            entries
                .iter()
                .map(|e| g.members.is_empty() || g.members.contains_key(&e.user_id))
                .collect(),
        ),
        None => ("this server".to_string(), vec![true; entries.len()]),
    };

    let lines: Vec<String> = entries
        .iter()
        .zip(still_here)
        .enumerate()
        .map(|(i, (e, here))| {
            let name = if here {
                format!("<@{}>", e.user_id.get())
            } else {
                format!("User ID: {} (Left Server)", e.user_id.get())
            };
            format!(
                "`#{}` {name} — **Level:** `{}` | **XP:** `{}`",
                i + 1,
                e.level,
                with_commas(e.xp)
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title(format!("🏆 Leaderboard for {guild_name}"))
        .description(lines.join("\n"))
        .colour(serenity::Colour::GOLD)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Top {LEADERBOARD_SIZE} users by XP in {guild_name}"
        )));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
