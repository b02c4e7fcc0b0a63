// warn - formal warning, logged and sent by DM

use poise::serenity_prelude as serenity;

use super::PrefixContext;
use crate::utils::config::colors;
use crate::utils::formatters::parse_user_id;

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let target = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new);
    let member = match target {
        Some(user_id) => pctx.member(user_id).await,
        None => None,
    };
    let Some(member) = member else {
        return pctx.reply("Please mention a user to warn.").await;
    };
    let user_id = member.user.id;
    let reason = pctx.reason(1);

    if pctx.is_protected(&member) {
        let embed = serenity::CreateEmbed::new()
            .color(colors::WARNING)
            .description("You cannot warn mods.");
        return pctx.reply_embed(embed).await;
    }

    pctx.reply(format!("<@{}> has been **__WARNED__**", user_id)).await?;
    pctx.log_event(
        pctx.config.logging.events.warn,
        format!(
            "<@{}> has been **__WARNED__** by <@{}> for: **{}**",
            user_id, pctx.msg.author.id, reason
        ),
    )
    .await;

    pctx.dm_or_log(
        user_id,
        format!(
            "You have been **__WARNED__** in **{}** for: **{}**",
            pctx.guild_name(),
            reason
        ),
        format!("Could not send DM to <@{}> about the warning.", user_id),
    )
    .await;
    Ok(())
}
