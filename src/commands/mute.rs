// mute - timeout a member for a duration, or lift the timeout
//
// `mute @user 10m reason` times out; `mute @user` with no duration unmutes.
// The mute-end DM is a durable scheduled task.

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::services::scheduler::TaskAction;
use crate::utils::config::colors;
use crate::utils::formatters::{parse_duration, parse_user_id};

/// Discord caps timeouts at 28 days
const MAX_TIMEOUT_SECS: u64 = 28 * 24 * 60 * 60;

pub const INVALID_DURATION: &str = "Invalid duration format. Use formats like `10m`, `1h`, `1d`.";
const MUTE_FAILED: &str = "An error occurred while trying to mute or unmute the user.";

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let target = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new);
    let member = match target {
        Some(user_id) => pctx.member(user_id).await,
        None => None,
    };
    let Some(member) = member else {
        return pctx.reply("Please mention a user to timeout or untimeout.").await;
    };
    if pctx.is_protected(&member) {
        let embed = serenity::CreateEmbed::new()
            .color(colors::WARNING)
            .description("You cannot mute mods.");
        return pctx.reply_embed(embed).await;
    }

    let reason = pctx.reason(2);
    match pctx.arg(1) {
        Some(duration) => mute(pctx, member.user.id, duration, &reason).await,
        None => unmute(pctx, member.user.id, &reason).await,
    }
}

async fn mute(
    pctx: &PrefixContext<'_>,
    user_id: serenity::UserId,
    duration_text: &str,
    reason: &str,
) -> anyhow::Result<()> {
    let Some(duration) = parse_duration(duration_text).filter(|d| d.as_secs() <= MAX_TIMEOUT_SECS)
    else {
        return pctx.reply(INVALID_DURATION).await;
    };

    let until = chrono::Utc::now() + chrono::Duration::from_std(duration)?;
    let until = serenity::Timestamp::from_unix_timestamp(until.timestamp())?;
    let edit = serenity::EditMember::new()
        .disable_communication_until_datetime(until)
        .audit_log_reason(reason);
    if let Err(e) = pctx.guild_id.edit_member(&pctx.ctx.http, user_id, edit).await {
        warn!("Timeout of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx.reply(MUTE_FAILED).await;
    }

    pctx.reply(format!("<@{}> has been __**MUTED**__", user_id)).await?;
    pctx.dm_or_log(
        user_id,
        format!(
            "You have been __**MUTED**__ in **{}** for **{}** due to: **{}**",
            pctx.guild_name(),
            duration_text,
            reason
        ),
        format!("Could not send DM to <@{}> about the mute.", user_id),
    )
    .await;
    pctx.log_event(
        pctx.config.logging.events.mute,
        format!(
            "Action: Mute\nUser: <@{}>\nBy: <@{}>\nDuration: {}\nReason: {}",
            user_id, pctx.msg.author.id, duration_text, reason
        ),
    )
    .await;

    let action = TaskAction::MuteEnded {
        guild_id: pctx.guild_id,
        guild_name: pctx.guild_name().to_string(),
        user_id,
        log_channel_id: pctx.config.active_log_channel(),
    };
    let scheduler = &pctx.data.scheduler;
    if let Err(e) = scheduler.cancel_mute_end(pctx.guild_id, user_id).await {
        warn!("Could not drop earlier mute-end notice for {}: {:#}", user_id, e);
    }
    if let Err(e) = scheduler.schedule(duration, action).await {
        warn!("Could not schedule mute-end notice for {}: {:#}", user_id, e);
    }
    Ok(())
}

async fn unmute(pctx: &PrefixContext<'_>, user_id: serenity::UserId, reason: &str) -> anyhow::Result<()> {
    let edit = serenity::EditMember::new()
        .enable_communication()
        .audit_log_reason(reason);
    if let Err(e) = pctx.guild_id.edit_member(&pctx.ctx.http, user_id, edit).await {
        warn!("Removing timeout of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx.reply(MUTE_FAILED).await;
    }

    if let Err(e) = pctx.data.scheduler.cancel_mute_end(pctx.guild_id, user_id).await {
        warn!("Could not drop mute-end notice for {}: {:#}", user_id, e);
    }

    pctx.reply(format!("<@{}> has been __**UNMUTED**__", user_id)).await?;
    pctx.log_event(
        pctx.config.logging.events.unmute,
        format!(
            "Action: Unmute\nUser: <@{}>\nBy: <@{}>\nReason: {}",
            user_id, pctx.msg.author.id, reason
        ),
    )
    .await;
    Ok(())
}
