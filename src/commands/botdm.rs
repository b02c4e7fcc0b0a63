// botdm - send a DM to a user as the bot

use poise::serenity_prelude as serenity;

use super::PrefixContext;
use crate::utils::formatters::parse_user_id;

const NOT_SENT: &str = "nice I won't DM anyone.";

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please mention a valid user.").await;
    };
    let text = pctx.rest(1);
    if text.is_empty() {
        return pctx.reply(NOT_SENT).await;
    }

    let dm = serenity::CreateMessage::new().content(text);
    match user_id.direct_message(pctx.ctx, dm).await {
        Ok(_) => pctx.reply("done").await,
        Err(e) => {
            tracing::debug!("DM to {} failed: {}", user_id, e);
            pctx.reply(NOT_SENT).await
        }
    }
}
