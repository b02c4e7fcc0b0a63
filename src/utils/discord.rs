// Discord helpers - error codes, rank checks and best-effort sends

use poise::serenity_prelude as serenity;
use tracing::warn;

pub const UNKNOWN_WEBHOOK: isize = 10015;
pub const UNKNOWN_BAN: isize = 10026;
pub const UNKNOWN_INTERACTION: isize = 10062;

/// Discord JSON error code carried by a failed REST call
pub fn error_code(err: &::serenity::Error) -> Option<isize> {
    match err {
        ::serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(resp)) => {
            Some(resp.error.code)
        }
        _ => None,
    }
}

/// The interaction token is gone; further responses would fail too.
pub fn is_expired_interaction(err: &::serenity::Error) -> bool {
    matches!(error_code(err), Some(UNKNOWN_INTERACTION | UNKNOWN_WEBHOOK))
}

pub fn is_system(msg: &serenity::Message) -> bool {
    msg.author.system
        || !matches!(
            msg.kind,
            serenity::MessageType::Regular | serenity::MessageType::InlineReply
        )
}

/// Position of the highest of `roles` (0 for @everyone only)
pub fn top_position_of(guild: &serenity::Guild, roles: &[serenity::RoleId]) -> u16 {
    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|r| r.position)
        .max()
        .unwrap_or(0)
}

pub fn top_role_position(guild: &serenity::Guild, member: &serenity::Member) -> u16 {
    top_position_of(guild, &member.roles)
}

/// Whether the bot's highest role sits above the target member's
pub fn bot_outranks(guild: &serenity::Guild, bot_id: serenity::UserId, target: &serenity::Member) -> bool {
    if target.user.id == guild.owner_id {
        return false;
    }
    match guild.members.get(&bot_id) {
        Some(bot) => top_role_position(guild, bot) > top_role_position(guild, target),
        None => false,
    }
}

/// Allowed mentions that ping nobody
pub fn no_pings() -> serenity::CreateAllowedMentions {
    serenity::CreateAllowedMentions::new()
}

/// Send to a channel, logging instead of failing
pub async fn send_quiet(
    http: &serenity::Http,
    channel: serenity::ChannelId,
    message: serenity::CreateMessage,
) -> bool {
    match channel.send_message(http, message).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to send message to channel {}: {}", channel, e);
            false
        }
    }
}

/// Plain-text log line with mentions disabled
pub async fn log_text(http: &serenity::Http, channel: Option<serenity::ChannelId>, content: impl Into<String>) {
    if let Some(channel) = channel {
        send_quiet(
            http,
            channel,
            serenity::CreateMessage::new()
                .content(content.into())
                .allowed_mentions(no_pings()),
        )
        .await;
    }
}

/// Reply to a message without pinging anyone
pub async fn reply(
    http: &serenity::Http,
    msg: &serenity::Message,
    content: impl Into<String>,
) -> serenity::Result<serenity::Message> {
    msg.channel_id
        .send_message(
            http,
            serenity::CreateMessage::new()
                .content(content.into())
                .reference_message(msg)
                .allowed_mentions(no_pings()),
        )
        .await
}

/// Whether the bot may delete other people's messages in `channel_id`
pub fn bot_can_manage_messages(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
) -> bool {
    let bot_id = ctx.cache.current_user().id;
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };
    match (guild.channels.get(&channel_id), guild.members.get(&bot_id)) {
        (Some(channel), Some(bot)) => guild.user_permissions_in(channel, bot).manage_messages(),
        _ => false,
    }
}

/// Guild owner or a member holding Administrator
pub async fn is_administrator(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> bool {
    let Ok(member) = guild_id.member(ctx, user_id).await else {
        return false;
    };
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };
    guild.owner_id == user_id || guild.member_permissions(&member).administrator()
}
