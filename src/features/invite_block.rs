// Invite block - remove Discord invite links posted by regular members

use once_cell::sync::Lazy;
use poise::serenity_prelude as serenity;
use regex::Regex;
use tracing::{debug, info};

use crate::features::permissions::is_moderator;
use crate::features::pipeline::Flow;
use crate::models::server_config::ServerConfig;
use crate::utils::discord;
use crate::utils::formatters::truncate_plain;
use crate::Data;

static INVITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(discord\.gg|discord\.com/invite)/[A-Za-z0-9]+").unwrap()
});

const LOGGED_CONTENT_CHARS: usize = 500;

pub fn contains_invite(content: &str) -> bool {
    INVITE_RE.is_match(content)
}

pub fn should_block(
    config: &ServerConfig,
    author_is_bot: bool,
    is_system: bool,
    author_is_moderator: bool,
    content: &str,
) -> bool {
    config.features.invite_block.enabled
        && !author_is_bot
        && !is_system
        && !author_is_moderator
        && contains_invite(content)
}

pub fn log_line(
    user_tag: &str,
    user_id: serenity::UserId,
    channel_id: serenity::ChannelId,
    content: &str,
) -> String {
    format!(
        "Action: Invite Block\nUser: {} ({})\nChannel: <#{}>\nMessage: {}",
        user_tag,
        user_id,
        channel_id,
        truncate_plain(content, LOGGED_CONTENT_CHARS)
    )
}

pub async fn handle(
    ctx: &serenity::Context,
    _data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(Flow::Continue);
    };
    let roles = msg.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[]);
    let moderator = is_moderator(config, msg.author.id, roles, None);

    if !should_block(config, msg.author.bot, discord::is_system(msg), moderator, &msg.content) {
        return Ok(Flow::Continue);
    }

    info!("Blocked invite from {} in guild {}", msg.author.id, guild_id);
    if discord::bot_can_manage_messages(ctx, guild_id, msg.channel_id) {
        if let Err(e) = msg.delete(&ctx.http).await {
            debug!("Could not delete invite message {}: {}", msg.id, e);
        }
    }

    discord::log_text(
        &ctx.http,
        config.active_log_channel(),
        log_line(&msg.author.tag(), msg.author.id, msg.channel_id, &msg.content),
    )
    .await;

    Ok(Flow::Handled)
}
