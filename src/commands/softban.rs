// softban - ban to clear recent messages, then unban shortly after

use std::time::Duration;

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::services::scheduler::{Announcement, TaskAction};
use crate::utils::config::{colors, SOFTBAN_UNBAN_DELAY_SECS};
use crate::utils::formatters::parse_user_id;

pub const UNBAN_REASON: &str = "Softban completed";

/// Messages from the last day are removed by the ban itself
const SOFTBAN_DELETE_DAYS: u8 = 1;

pub fn ban_reason(reason: &str) -> String {
    format!("Softban: {}", reason)
}

pub fn unban_notice(user_id: serenity::UserId) -> String {
    format!("<@{}> has been __**UNBANNED**__ (softban completed).", user_id)
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please provide a user ID or mention to softban.").await;
    };
    let reason = pctx.reason(1);

    let Some(member) = pctx.member(user_id).await else {
        return pctx.reply("Could not find this user in the server.").await;
    };
    if pctx.is_protected(&member) {
        let embed = serenity::CreateEmbed::new()
            .color(colors::WARNING)
            .description("You cannot softban mods.");
        return pctx.reply_embed(embed).await;
    }

    pctx.dm_or_log(
        user_id,
        format!(
            "You have been __**SOFTBANNED**__ from **{}** for the following reason: {}.",
            pctx.guild_name(),
            reason
        ),
        format!("Could not send Softban DM to <@{}>.", user_id),
    )
    .await;

    if let Err(e) = pctx
        .guild_id
        .ban_with_reason(&pctx.ctx.http, user_id, SOFTBAN_DELETE_DAYS, ban_reason(&reason))
        .await
    {
        warn!("Softban of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx
            .reply("I was unable to softban user. Please check if the ID is correct.")
            .await;
    }

    pctx.reply(format!("<@{}> has been __**SOFTBANNED**__.", user_id)).await?;
    pctx.log_event(
        pctx.config.logging.events.ban_add,
        format!(
            "Action: Softban\nUser: <@{}>\nBy: <@{}>\nReason: {}",
            user_id, pctx.msg.author.id, reason
        ),
    )
    .await;

    let action = TaskAction::Unban {
        guild_id: pctx.guild_id,
        user_id,
        reason: UNBAN_REASON.to_string(),
        announce: Some(Announcement {
            channel_id: pctx.msg.channel_id,
            content: unban_notice(user_id),
        }),
    };
    pctx.data
        .scheduler
        .schedule(Duration::from_secs(SOFTBAN_UNBAN_DELAY_SECS), action)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softban_texts() {
        assert_eq!(ban_reason("spam"), "Softban: spam");
        assert_eq!(
            unban_notice(serenity::UserId::new(42)),
            "<@42> has been __**UNBANNED**__ (softban completed)."
        );
    }
}
