// unban - lift a ban by user id

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::ban::is_banned;
use super::PrefixContext;
use crate::utils::formatters::parse_user_id;

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please provide a user ID to unban.").await;
    };
    let reason = pctx.reason(1);
    let http = &pctx.ctx.http;

    let Some(ban) = is_banned(http, pctx.guild_id, user_id).await? else {
        return pctx.reply("user is likely unbanned.").await;
    };
    let tag = ban.user.tag();

    if let Err(e) = http.remove_ban(pctx.guild_id, user_id, Some(reason.as_str())).await {
        warn!("Unban of {} in {} failed: {}", user_id, pctx.guild_id, e);
        return pctx.reply("I was unable to unban the user.").await;
    }

    pctx.reply(format!("{} has been __**UNBANNED**__.", tag)).await?;
    pctx.log_event(
        pctx.config.logging.events.ban_remove,
        format!(
            "{} has been __**UNBANNED**__ by <@{}> for: {}",
            tag, pctx.msg.author.id, reason
        ),
    )
    .await;
    Ok(())
}
