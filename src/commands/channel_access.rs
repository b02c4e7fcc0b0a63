// add / removec - per-member view and send access to the current channel

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::utils::formatters::parse_user_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Grant,
    Revoke,
}

impl Access {
    fn permissions() -> serenity::Permissions {
        serenity::Permissions::VIEW_CHANNEL | serenity::Permissions::SEND_MESSAGES
    }

    pub fn overwrite(self, user_id: serenity::UserId) -> serenity::PermissionOverwrite {
        let (allow, deny) = match self {
            Access::Grant => (Self::permissions(), serenity::Permissions::empty()),
            Access::Revoke => (serenity::Permissions::empty(), Self::permissions()),
        };
        serenity::PermissionOverwrite {
            allow,
            deny,
            kind: serenity::PermissionOverwriteType::Member(user_id),
        }
    }

    fn success(self, user_id: serenity::UserId) -> String {
        match self {
            Access::Grant => format!("Added <@{}> to the channel successfully.", user_id),
            Access::Revoke => format!("Removed <@{}> from the channel successfully.", user_id),
        }
    }

    fn log_line(self, user_id: serenity::UserId, channel: &str, by: serenity::UserId) -> String {
        let verb = match self {
            Access::Grant => "__**ADDED**__ to",
            Access::Revoke => "__**REMOVED**__ from",
        };
        format!("<@{}> has been {} {} by <@{}>.", user_id, verb, channel, by)
    }

    fn failure(self) -> &'static str {
        match self {
            Access::Grant => "I cannot add this person to this channel.",
            Access::Revoke => "I cannot remove this person from this channel.",
        }
    }
}

pub async fn run(pctx: &PrefixContext<'_>, access: Access) -> anyhow::Result<()> {
    let Some(user_id) = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new) else {
        return pctx.reply("Please mention a valid user.").await;
    };

    let channel = match pctx.msg.channel_id.to_channel(pctx.ctx).await {
        Ok(serenity::Channel::Guild(channel)) if channel.kind == serenity::ChannelType::Text => channel,
        _ => return pctx.reply("This command only works in server text channels.").await,
    };

    if let Err(e) = channel
        .id
        .create_permission(&pctx.ctx.http, access.overwrite(user_id))
        .await
    {
        warn!("Permission overwrite for {} in {} failed: {}", user_id, channel.id, e);
        return pctx.reply(access.failure()).await;
    }

    match access {
        Access::Grant => pctx.say(access.success(user_id)).await?,
        Access::Revoke => pctx.reply(access.success(user_id)).await?,
    }
    pctx.log(access.log_line(user_id, &channel.name, pctx.msg.author.id)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_direction() {
        let user = serenity::UserId::new(7);
        let grant = Access::Grant.overwrite(user);
        assert!(grant.allow.contains(serenity::Permissions::VIEW_CHANNEL));
        assert!(grant.deny.is_empty());

        let revoke = Access::Revoke.overwrite(user);
        assert!(revoke.allow.is_empty());
        assert!(revoke.deny.contains(serenity::Permissions::SEND_MESSAGES));
        assert_eq!(revoke.kind, serenity::PermissionOverwriteType::Member(user));
    }

    #[test]
    fn test_log_line() {
        let line = Access::Revoke.log_line(serenity::UserId::new(7), "staff", serenity::UserId::new(9));
        assert_eq!(line, "<@7> has been __**REMOVED**__ from staff by <@9>.");
    }
}
