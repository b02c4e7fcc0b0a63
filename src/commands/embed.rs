// embed - on-demand Instagram unfurl

use super::PrefixContext;
use crate::api::instagram;
use crate::features::auto_embed::CANNOT_EMBED;

const UNSUPPORTED: &str = "Unsupported platform. Currently supports: Instagram";

/// Masked link so Discord renders only the preview
pub fn masked_link(url: &str) -> String {
    format!("[\u{2800}]({})", url)
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(link) = pctx.arg(0) else {
        return pctx.reply("You need to provide a link to embed.").await;
    };
    if !instagram::is_post_url(link) {
        return pctx.reply(UNSUPPORTED).await;
    }

    let _ = pctx.msg.channel_id.broadcast_typing(&pctx.ctx.http).await;
    match instagram::embeddable_url(&pctx.data.http_client, link).await {
        Some(url) => pctx.reply(masked_link(&url)).await,
        None => pctx.reply(CANNOT_EMBED).await,
    }
}
