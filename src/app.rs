use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use poise::{Framework, FrameworkError, PrefixFrameworkOptions};
use serenity::all::{ClientBuilder, GatewayIntents};
use tracing_subscriber::EnvFilter;

use crate::commands::{help, levelconfig, rank};
use crate::config::Config;
use crate::events::event_handler;
use crate::state::AppState;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let db_url = config.database_url.clone();
    let dev_guild = config.dev_guild_id;

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;

    let framework = Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                rank::rank(),
                rank::leaderboard(),
                levelconfig::levelconfig(),
                help::levelhelp(),
            ],
            prefix_options: PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                match dev_guild {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(ctx, commands, guild_id).await?
                    }
                    None => poise::builtins::register_globally(ctx, commands).await?,
                }
                AppState::new(&db_url).await
            })
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Failed to build Discord client")?;

    client.start().await.context("Discord client stopped")?;
    Ok(())
}

async fn on_error(error: FrameworkError<'_, Arc<AppState>, anyhow::Error>) {
    if let FrameworkError::Command { error, ctx, .. } = &error {
        tracing::error!(
            "command `{}` failed: {error:#}",
            ctx.command().qualified_name
        );
    }
    if let Err(e) = poise::builtins::on_error(error).await {
        tracing::error!("Error while handling error: {e}");
    }
}
