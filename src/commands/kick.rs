// kick - remove a member from the server

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::utils::config::colors;
use crate::utils::formatters::parse_user_id;

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please provide a user mention or ID to kick.").await;
    };
    let reason = pctx.reason(1);

    let Some(member) = pctx.member(user_id).await else {
        return pctx.reply("Could not find this user in the server.").await;
    };
    if pctx.is_protected(&member) {
        let embed = serenity::CreateEmbed::new()
            .color(colors::WARNING)
            .description("You cannot kick mods.");
        return pctx.reply_embed(embed).await;
    }
    if !pctx.bot_outranks(&member) {
        return pctx
            .reply("I cannot kick this user. They might have a higher role or permissions.")
            .await;
    }

    pctx.dm_or_log(
        user_id,
        format!(
            "You have been __**KICKED**__ from **{}** for the following reason: {}",
            pctx.guild_name(),
            reason
        ),
        format!("Could not send DM to <@{}> before kick.", user_id),
    )
    .await;

    if let Err(e) = member.kick_with_reason(&pctx.ctx.http, &reason).await {
        warn!("Kick of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx
            .reply("I was unable to kick the user. Please check if the ID is correct and I have the necessary permissions.")
            .await;
    }

    pctx.say(format!("<@{}> has been __**KICKED**__.", user_id)).await?;
    pctx.log_event(
        pctx.config.logging.events.kick,
        format!(
            "Action: Kick\nUser: <@{}>\nBy: <@{}>\nReason: {}",
            user_id, pctx.msg.author.id, reason
        ),
    )
    .await;
    Ok(())
}
