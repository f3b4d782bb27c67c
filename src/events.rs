use std::sync::Arc;

use anyhow::Result;
use poise::FrameworkContext;
use poise::serenity_prelude as serenity;
use serenity::prelude::Context;

use crate::leveling::{AwardEngine, AwardOutcome, MessageEvent, SerenityGateway};
use crate::state::AppState;

pub async fn event_handler(
    ctx: &Context,
    event: &serenity::FullEvent,
    _framework: FrameworkContext<'_, Arc<AppState>, anyhow::Error>,
    state: &Arc<AppState>,
) -> Result<()> {
    use serenity::FullEvent::*;
    match event {
        Ready { data_about_bot, .. } => handle_ready(data_about_bot),
        Message { new_message } => on_message(ctx, state, new_message).await?,
        _ => {}
    }
    Ok(())
}

pub fn handle_ready(ready: &serenity::Ready) {
    tracing::info!("Connected as {}", ready.user.name);
    for guild in &ready.guilds {
        tracing::info!("Connected to guild: {}", guild.id);
    }
}

/// Every guild message from a human is a candidate for XP.
pub async fn on_message(ctx: &Context, state: &AppState, msg: &serenity::Message) -> Result<()> {
    let event = MessageEvent::from(msg);
    let gateway = SerenityGateway::new(ctx);
    let outcome = AwardEngine::new(&state.db, &state.award_locks, &gateway)
        .process(&event)
        .await?;

    if let AwardOutcome::LeveledUp { announced_in: None, to, .. } = outcome {
        tracing::warn!(
            "level {to} for user {} was saved but never announced",
            event.author_id
        );
    }
    Ok(())
}
