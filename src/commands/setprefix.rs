// setprefix - change the command prefix; works without the current prefix

use poise::serenity_prelude as serenity;
use serde_json::json;

use crate::features::pipeline::Flow;
use crate::models::server_config::{is_valid_prefix, Section, ServerConfig};
use crate::utils::discord;
use crate::Data;

pub const KEYWORD: &str = "setprefix";

const INVALID: &str = "Invalid prefix. Please use 1-5 characters.";

/// `Some(Some(p))` for `setprefix p`, `Some(None)` when the argument is missing,
/// `None` when the message is not a setprefix invocation.
pub fn parse(content: &str) -> Option<Option<&str>> {
    let mut words = content.split_whitespace();
    let first = words.next()?;
    if !first.eq_ignore_ascii_case(KEYWORD) {
        return None;
    }
    Some(words.next())
}

pub async fn handle(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    let (Some(guild_id), Some(requested)) = (msg.guild_id, parse(&msg.content)) else {
        return Ok(Flow::Continue);
    };
    if !discord::is_administrator(ctx, guild_id, msg.author.id).await {
        return Ok(Flow::Continue);
    }

    let reply = match requested.filter(|p| is_valid_prefix(p)) {
        Some(prefix) => {
            let saved = data
                .config_manager
                .update_config_section(guild_id, Section::Prefix, json!(prefix))
                .await;
            if saved {
                tracing::info!("Prefix of {} ({}) changed to {}", config.guild_name, guild_id, prefix);
                format!("Prefix changed to `{}`", prefix)
            } else {
                data.bot_config.error_message.clone()
            }
        }
        None => INVALID.to_string(),
    };
    discord::reply(&ctx.http, msg, reply).await?;
    Ok(Flow::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse("setprefix !"), Some(Some("!")));
        assert_eq!(parse("SetPrefix   ?? extra"), Some(Some("??")));
        assert_eq!(parse("setprefix"), Some(None));
        assert_eq!(parse("setprefixes !"), None);
        assert_eq!(parse(".setprefix !"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_prefix_length_bounds() {
        for (raw, ok) in [("!", true), ("abcde", true), ("abcdef", false)] {
            let content = format!("setprefix {}", raw);
            let parsed = parse(&content).flatten();
            assert_eq!(parsed.filter(|p| is_valid_prefix(p)).is_some(), ok, "{}", raw);
        }
    }
}
