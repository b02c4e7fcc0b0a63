// Member join/leave handling: role restore, auto-role, welcome and goodbye

use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::features::role_restore;
use crate::models::guild_snapshot::GuildSnapshot;
use crate::models::server_config::{channel_id, role_id, ServerConfig};
use crate::services::config_manager::GuildIdentity;
use crate::utils::discord;
use crate::utils::formatters::role_mentions;
use crate::Data;

/// Names substituted into welcome/goodbye templates
#[derive(Debug, Clone)]
pub struct MemberNames {
    pub mention: String,
    pub username: String,
    pub display_name: String,
}

impl MemberNames {
    pub fn of(user: &serenity::User, nick: Option<&str>) -> Self {
        Self {
            mention: format!("<@{}>", user.id),
            username: user.name.clone(),
            display_name: nick.unwrap_or_else(|| user.display_name()).to_string(),
        }
    }
}

pub fn render_template(template: &str, names: &MemberNames) -> String {
    template
        .replace("{user}", &names.mention)
        .replace("{username}", &names.username)
        .replace("{displayName}", &names.display_name)
}

pub fn welcome_text(config: &ServerConfig, names: &MemberNames, restored: &[serenity::RoleId]) -> String {
    match config.features.welcome.message.as_deref().filter(|m| !m.is_empty()) {
        Some(template) => render_template(template, names),
        None => format!(
            "**{}** joined the server \nRestored roles: {}",
            names.display_name,
            role_mentions(restored)
        ),
    }
}

pub fn goodbye_text(config: &ServerConfig, names: &MemberNames, stored: &[serenity::RoleId]) -> String {
    match config.features.goodbye.message.as_deref().filter(|m| !m.is_empty()) {
        Some(template) => render_template(template, names),
        None => format!(
            "**{}** left the server. \nStored roles: {}",
            names.display_name,
            role_mentions(stored)
        ),
    }
}

pub fn welcome_channel(config: &ServerConfig) -> Option<serenity::ChannelId> {
    channel_id(config.features.welcome.channel_id.as_ref())
        .or_else(|| channel_id(config.channels.get("welcome")))
}

pub fn goodbye_channel(config: &ServerConfig) -> Option<serenity::ChannelId> {
    channel_id(config.features.goodbye.channel_id.as_ref())
        .or_else(|| channel_id(config.channels.get("goodbye")))
}

/// Member-leave log line, or None when that event is not logged
pub fn leave_log(config: &ServerConfig, names: &MemberNames, tag: &str) -> Option<(serenity::ChannelId, String)> {
    if !config.logging.enabled || !config.logging.events.member_leave {
        return None;
    }
    let channel = config.member_log_channel()?;
    Some((channel, format!("**{}** ({}) left the server.", names.display_name, tag)))
}

async fn add_roles(
    ctx: &serenity::Context,
    member: &serenity::Member,
    roles: &[serenity::RoleId],
    added: &mut Vec<serenity::RoleId>,
) {
    for role in roles {
        if added.contains(role) || member.roles.contains(role) {
            continue;
        }
        match ctx.http.add_member_role(member.guild_id, member.user.id, *role, None).await {
            Ok(()) => added.push(*role),
            Err(e) => warn!("Could not add role {} to {}: {}", role, member.user.id, e),
        }
    }
}

pub async fn on_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> anyhow::Result<()> {
    let Some(identity) = GuildIdentity::from_cache(ctx, member.guild_id) else {
        debug!("Guild {} not cached, skipping member join", member.guild_id);
        return Ok(());
    };
    let config = data.config_manager.get_or_create_config(&identity).await;
    let snapshot = GuildSnapshot::from_cache(ctx, member.guild_id);

    let mut added = Vec::new();
    if config.features.role_restore.enabled {
        let stored = role_restore::take_roles(data.store.as_ref(), member.guild_id, member.user.id).await?;
        if let Some(snapshot) = &snapshot {
            let roles = role_restore::assignable_roles(snapshot, stored);
            add_roles(ctx, member, &roles, &mut added).await;
        }
    }

    if config.features.auto_role.enabled {
        if let Some(snapshot) = &snapshot {
            let wanted = config
                .features
                .auto_role
                .role_ids
                .iter()
                .filter_map(|id| role_id(id));
            let roles = role_restore::assignable_roles(snapshot, wanted);
            add_roles(ctx, member, &roles, &mut added).await;
        }
    }

    if config.features.welcome.enabled {
        if let Some(channel) = welcome_channel(&config) {
            let names = MemberNames::of(&member.user, member.nick.as_deref());
            let text = welcome_text(&config, &names, &added);
            discord::send_quiet(
                &ctx.http,
                channel,
                serenity::CreateMessage::new()
                    .content(text)
                    .allowed_mentions(discord::no_pings()),
            )
            .await;
        }
    }

    Ok(())
}

pub async fn on_member_leave(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    member: Option<&serenity::Member>,
) -> anyhow::Result<()> {
    let Some(identity) = GuildIdentity::from_cache(ctx, guild_id) else {
        debug!("Guild {} not cached, skipping member leave", guild_id);
        return Ok(());
    };
    let config = data.config_manager.get_or_create_config(&identity).await;

    let mut stored = Vec::new();
    if config.features.role_restore.enabled {
        match member {
            Some(member) => {
                let managed: Vec<serenity::RoleId> = ctx
                    .cache
                    .guild(guild_id)
                    .map(|g| g.roles.values().filter(|r| r.managed).map(|r| r.id).collect())
                    .unwrap_or_default();
                stored = role_restore::restorable_roles(guild_id, &member.roles, |r| managed.contains(&r));
                role_restore::remember_roles(data.store.as_ref(), guild_id, user.id, &stored).await?;
            }
            None => debug!("No cached member data for {} leaving {}, roles not stored", user.id, guild_id),
        }
    }

    let names = MemberNames::of(user, member.and_then(|m| m.nick.as_deref()));

    if config.features.goodbye.enabled {
        if let Some(channel) = goodbye_channel(&config) {
            discord::send_quiet(
                &ctx.http,
                channel,
                serenity::CreateMessage::new()
                    .content(goodbye_text(&config, &names, &stored))
                    .allowed_mentions(discord::no_pings()),
            )
            .await;
        }
    }

    if let Some((channel, line)) = leave_log(&config, &names, &user.tag()) {
        discord::log_text(&ctx.http, Some(channel), line).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> MemberNames {
        MemberNames {
            mention: "<@9>".into(),
            username: "ayu".into(),
            display_name: "Ayu".into(),
        }
    }

    #[test]
    fn test_render_template_replaces_every_placeholder() {
        let text = render_template("Hi {user}! {username} aka {displayName}, {user}", &names());
        assert_eq!(text, "Hi <@9>! ayu aka Ayu, <@9>");
    }

    #[test]
    fn test_default_texts_list_roles() {
        let config = ServerConfig::new("1", "Guild", "42");
        let roles = [serenity::RoleId::new(5), serenity::RoleId::new(6)];
        assert_eq!(
            welcome_text(&config, &names(), &roles),
            "**Ayu** joined the server \nRestored roles: <@&5>, <@&6>"
        );
        assert_eq!(
            goodbye_text(&config, &names(), &[]),
            "**Ayu** left the server. \nStored roles: None"
        );
    }

    #[test]
    fn test_custom_template_wins() {
        let mut config = ServerConfig::new("1", "Guild", "42");
        config.features.welcome.message = Some("Welcome {displayName}".into());
        assert_eq!(welcome_text(&config, &names(), &[]), "Welcome Ayu");
    }

    #[test]
    fn test_channels_fall_back_to_named_channels() {
        let mut config = ServerConfig::new("1", "Guild", "42");
        assert_eq!(welcome_channel(&config), None);

        config.channels.insert("welcome".into(), "77".into());
        assert_eq!(welcome_channel(&config), Some(serenity::ChannelId::new(77)));

        config.features.welcome.channel_id = Some("78".into());
        assert_eq!(welcome_channel(&config), Some(serenity::ChannelId::new(78)));
        assert_eq!(goodbye_channel(&config), None);
    }

    #[test]
    fn test_leave_log_uses_member_channel() {
        let mut config = ServerConfig::new("1", "Guild", "42");
        assert_eq!(leave_log(&config, &names(), "ayu"), None);

        config.logging.log_channel_id = Some("10".into());
        let (channel, line) = leave_log(&config, &names(), "ayu").unwrap();
        assert_eq!(channel, serenity::ChannelId::new(10));
        assert_eq!(line, "**Ayu** (ayu) left the server.");

        config.logging.member_log_channel_id = Some("11".into());
        assert_eq!(leave_log(&config, &names(), "ayu").unwrap().0, serenity::ChannelId::new(11));

        config.logging.events.member_leave = false;
        assert_eq!(leave_log(&config, &names(), "ayu"), None);
    }
}
