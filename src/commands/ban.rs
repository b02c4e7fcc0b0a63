// ban - ban a member or any user id

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::utils::config::colors;
use crate::utils::formatters::parse_user_id;

/// Whether `user_id` is on the guild's ban list
pub async fn is_banned(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> serenity::Result<Option<serenity::Ban>> {
    let bans = guild_id.bans(http, None, None).await?;
    Ok(bans.into_iter().find(|b| b.user.id == user_id))
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please provide a user ID or mention to ban.").await;
    };
    let reason = pctx.reason(1);
    let http = &pctx.ctx.http;

    if is_banned(http, pctx.guild_id, user_id).await?.is_some() {
        return pctx.reply("This user is already banned.").await;
    }

    match pctx.member(user_id).await {
        Some(member) => {
            if pctx.is_protected(&member) {
                let embed = serenity::CreateEmbed::new()
                    .color(colors::WARNING)
                    .description("You cannot ban mods.");
                return pctx.reply_embed(embed).await;
            }
            pctx.dm_or_log(
                user_id,
                format!(
                    "You have been __**BANNED**__ from **{}** for the following reason: {}",
                    pctx.guild_name(),
                    reason
                ),
                format!("Could not send Ban DM to <@{}>.", user_id),
            )
            .await;
        }
        None => {
            if user_id.to_user(pctx.ctx).await.is_err() {
                return pctx
                    .reply("Invalid user ID provided. Please make sure the ID is correct.")
                    .await;
            }
        }
    }

    if let Err(e) = pctx
        .guild_id
        .ban_with_reason(http, user_id, pctx.delete_message_days(), &reason)
        .await
    {
        warn!("Ban of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx
            .reply("I was unable to ban user. Please check if the ID is correct or if user is already banned.")
            .await;
    }

    pctx.reply(format!("<@{}> has been __**BANNED**__.", user_id)).await?;
    pctx.log_event(
        pctx.config.logging.events.ban_add,
        format!(
            "<@{}> has been __**BANNED**__ by <@{}> for: {}",
            user_id, pctx.msg.author.id, reason
        ),
    )
    .await;
    Ok(())
}
