// Auto-embed - reply to Instagram post links with an embeddable mirror

use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::api::instagram;
use crate::features::pipeline::Flow;
use crate::models::server_config::ServerConfig;
use crate::utils::discord;
use crate::Data;

pub const CANNOT_EMBED: &str = "I cannot embed this :(";

pub fn should_unfurl(
    config: &ServerConfig,
    author_is_bot: bool,
    is_system: bool,
    content: &str,
) -> bool {
    config.features.auto_embed.enabled
        && !author_is_bot
        && !is_system
        && !content.starts_with(config.prefix.as_str())
}

pub fn unfurl_reply(embeddable: Option<&str>) -> String {
    match embeddable {
        Some(url) => format!("here is embed:\n{}", url),
        None => CANNOT_EMBED.to_string(),
    }
}

pub async fn handle(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    if !should_unfurl(config, msg.author.bot, discord::is_system(msg), &msg.content) {
        return Ok(Flow::Continue);
    }

    let urls = instagram::find_post_urls(&msg.content);
    if urls.is_empty() {
        return Ok(Flow::Continue);
    }

    for url in urls {
        let embeddable = instagram::embeddable_url(&data.http_client, &url).await;
        if let Err(e) = discord::reply(&ctx.http, msg, unfurl_reply(embeddable.as_deref())).await {
            debug!("Auto-embed reply failed in {}: {}", msg.channel_id, e);
        }
    }

    Ok(Flow::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::new("1", "Guild", "42");
        config.features.auto_embed.enabled = true;
        config
    }

    #[test]
    fn test_should_unfurl() {
        let link = "look https://instagram.com/p/abc";
        assert!(should_unfurl(&config(), false, false, link));
        assert!(!should_unfurl(&config(), true, false, link));
        assert!(!should_unfurl(&config(), false, true, link));

        let mut disabled = config();
        disabled.features.auto_embed.enabled = false;
        assert!(!should_unfurl(&disabled, false, false, link));
    }

    #[test]
    fn test_commands_are_not_unfurled() {
        let mut config = config();
        assert!(!should_unfurl(&config, false, false, ".embed https://instagram.com/p/abc"));

        config.prefix = "!!".into();
        assert!(should_unfurl(&config, false, false, ".embed https://instagram.com/p/abc"));
        assert!(!should_unfurl(&config, false, false, "!!embed https://instagram.com/p/abc"));
    }

    #[test]
    fn test_unfurl_reply() {
        assert_eq!(
            unfurl_reply(Some("https://vxinstagram.com/p/abc")),
            "here is embed:\nhttps://vxinstagram.com/p/abc"
        );
        assert_eq!(unfurl_reply(None), CANNOT_EMBED);
    }
}
