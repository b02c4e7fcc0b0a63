// Message pipeline - ordered stages, the first one that handles a message wins

use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use tracing::warn;

use crate::commands;
use crate::features::{auto_embed, honeypot, invite_block};
use crate::models::server_config::ServerConfig;
use crate::services::config_manager::GuildIdentity;
use crate::utils::error_log::{log_error, ErrorSource};
use crate::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Handled,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Honeypot,
    InviteBlock,
    TempCommandDraft,
    AutoEmbed,
    SetPrefix,
    Commands,
}

impl Stage {
    pub const ORDER: [Stage; 6] = [
        Stage::Honeypot,
        Stage::InviteBlock,
        Stage::TempCommandDraft,
        Stage::AutoEmbed,
        Stage::SetPrefix,
        Stage::Commands,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Honeypot => "honeypot",
            Stage::InviteBlock => "inviteBlock",
            Stage::TempCommandDraft => "tempCommandDraft",
            Stage::AutoEmbed => "autoEmbed",
            Stage::SetPrefix => "setPrefix",
            Stage::Commands => "commands",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("stage {} failed: {:#}", .stage.name(), .cause)]
pub struct StageError {
    pub stage: Stage,
    pub cause: anyhow::Error,
}

/// Run every stage in order until one returns `Handled`.
/// Returns the stage that handled the message, if any.
pub async fn run<'a, F>(mut run_stage: F) -> Result<Option<Stage>, StageError>
where
    F: FnMut(Stage) -> BoxFuture<'a, anyhow::Result<Flow>>,
{
    for stage in Stage::ORDER {
        match run_stage(stage).await {
            Ok(Flow::Handled) => return Ok(Some(stage)),
            Ok(Flow::Continue) => {}
            Err(cause) => return Err(StageError { stage, cause }),
        }
    }
    Ok(None)
}

async fn run_stage(
    stage: Stage,
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    match stage {
        Stage::Honeypot => honeypot::handle(ctx, data, msg, config).await,
        Stage::InviteBlock => invite_block::handle(ctx, data, msg, config).await,
        Stage::TempCommandDraft => commands::tc::continue_draft(ctx, data, msg, config).await,
        Stage::AutoEmbed => auto_embed::handle(ctx, data, msg, config).await,
        Stage::SetPrefix => commands::setprefix::handle(ctx, data, msg, config).await,
        Stage::Commands => commands::dispatch(ctx, data, msg, config).await,
    }
}

/// Entry point for guild messages
pub async fn handle_message(ctx: &serenity::Context, data: &Data, msg: &serenity::Message) {
    let Some(guild_id) = msg.guild_id else {
        return;
    };
    if msg.author.bot {
        return;
    }
    let Some(identity) = GuildIdentity::from_cache(ctx, guild_id) else {
        return;
    };
    let config = data.config_manager.get_or_create_config(&identity).await;
    let config = &config;

    let result = run(|stage| Box::pin(run_stage(stage, ctx, data, msg, config))).await;

    if let Err(e) = result {
        warn!("Message {} in guild {}: {}", msg.id, guild_id, e);
        let origin = ErrorSource::new(format!("message:{}", e.stage.name()))
            .guild(guild_id, identity.name.clone())
            .user(msg.author.id);
        log_error(&ctx.http, data.bot_config.error_log_channel, &origin, &format!("{:#}", e.cause)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["honeypot", "inviteBlock", "tempCommandDraft", "autoEmbed", "setPrefix", "commands"]
        );
    }

    #[tokio::test]
    async fn test_first_handled_stage_stops_the_pass() {
        let seen = Mutex::new(Vec::new());
        let result = run(|stage| {
            seen.lock().unwrap().push(stage);
            Box::pin(async move {
                Ok(if stage == Stage::InviteBlock {
                    Flow::Handled
                } else {
                    Flow::Continue
                })
            })
        })
        .await
        .unwrap();

        assert_eq!(result, Some(Stage::InviteBlock));
        assert_eq!(*seen.lock().unwrap(), vec![Stage::Honeypot, Stage::InviteBlock]);
    }

    #[tokio::test]
    async fn test_all_continue_runs_every_stage() {
        let seen = Mutex::new(Vec::new());
        let result = run(|stage| {
            seen.lock().unwrap().push(stage);
            Box::pin(async { Ok(Flow::Continue) })
        })
        .await
        .unwrap();

        assert_eq!(result, None);
        assert_eq!(seen.lock().unwrap().len(), Stage::ORDER.len());
    }

    #[tokio::test]
    async fn test_error_names_the_stage() {
        let err = run(|stage| {
            Box::pin(async move {
                if stage == Stage::AutoEmbed {
                    anyhow::bail!("probe exploded");
                }
                Ok(Flow::Continue)
            })
        })
        .await
        .unwrap_err();

        assert_eq!(err.stage, Stage::AutoEmbed);
        assert!(err.to_string().contains("autoEmbed"));
        assert!(err.to_string().contains("probe exploded"));
    }
}
