// Guild snapshot - the slice of live guild state the validator needs

use std::collections::BTreeMap;

use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

impl From<serenity::ChannelType> for ChannelKind {
    fn from(kind: serenity::ChannelType) -> Self {
        match kind {
            serenity::ChannelType::Text | serenity::ChannelType::News => ChannelKind::Text,
            serenity::ChannelType::Voice | serenity::ChannelType::Stage => ChannelKind::Voice,
            serenity::ChannelType::Category => ChannelKind::Category,
            _ => ChannelKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelKind,
    pub bot_can_send: bool,
    pub bot_can_manage_messages: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub position: u16,
    pub managed: bool,
}

/// Channels, roles and the bot's standing in one guild
#[derive(Debug, Clone, Default)]
pub struct GuildSnapshot {
    pub id: u64,
    pub name: String,
    pub owner_id: u64,
    pub channels: BTreeMap<serenity::ChannelId, ChannelInfo>,
    pub roles: BTreeMap<serenity::RoleId, RoleInfo>,
    /// Position of the bot's highest role (0 when it only has @everyone)
    pub bot_top_position: u16,
    pub bot_can_ban: bool,
    pub bot_can_manage_roles: bool,
}

impl GuildSnapshot {
    /// Capture the snapshot from a cached guild.
    pub fn from_guild(guild: &serenity::Guild, bot_id: serenity::UserId) -> Self {
        let bot_member = guild.members.get(&bot_id);

        let channels = guild
            .channels
            .iter()
            .map(|(id, channel)| {
                let perms = bot_member
                    .map(|m| guild.user_permissions_in(channel, m))
                    .unwrap_or_else(serenity::Permissions::empty);
                let info = ChannelInfo {
                    name: channel.name.clone(),
                    kind: channel.kind.into(),
                    bot_can_send: perms.send_messages() && perms.view_channel(),
                    bot_can_manage_messages: perms.manage_messages(),
                };
                (*id, info)
            })
            .collect();

        let roles = guild
            .roles
            .iter()
            .map(|(id, role)| {
                let info = RoleInfo {
                    name: role.name.clone(),
                    position: role.position,
                    managed: role.managed,
                };
                (*id, info)
            })
            .collect();

        let (bot_top_position, guild_perms) = match bot_member {
            Some(member) => (
                guild.member_highest_role(member).map(|r| r.position).unwrap_or(0),
                guild.member_permissions(member),
            ),
            None => (0, serenity::Permissions::empty()),
        };

        Self {
            id: guild.id.get(),
            name: guild.name.clone(),
            owner_id: guild.owner_id.get(),
            channels,
            roles,
            bot_top_position,
            bot_can_ban: guild_perms.ban_members(),
            bot_can_manage_roles: guild_perms.manage_roles(),
        }
    }

    /// Snapshot from the serenity cache, if the guild is cached.
    pub fn from_cache(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Option<Self> {
        let bot_id = ctx.cache.current_user().id;
        let guild = ctx.cache.guild(guild_id)?;
        Some(Self::from_guild(&guild, bot_id))
    }

    pub fn channel(&self, raw: &str) -> Option<&ChannelInfo> {
        let id = crate::models::server_config::parse_snowflake(raw)?;
        self.channels.get(&serenity::ChannelId::new(id))
    }

    pub fn has_channel(&self, raw: &str) -> bool {
        self.channel(raw).is_some()
    }

    pub fn role(&self, raw: &str) -> Option<&RoleInfo> {
        let id = crate::models::server_config::parse_snowflake(raw)?;
        self.roles.get(&serenity::RoleId::new(id))
    }

    pub fn has_role(&self, raw: &str) -> bool {
        self.role(raw).is_some()
    }

    /// First text channel (lowest id) the bot can post in
    pub fn first_sendable_text_channel(&self) -> Option<serenity::ChannelId> {
        self.channels
            .iter()
            .find(|(_, c)| c.kind == ChannelKind::Text && c.bot_can_send)
            .map(|(id, _)| *id)
    }

    /// The bot may assign a role only when its highest role sits above it.
    pub fn bot_can_assign(&self, role: &RoleInfo) -> bool {
        self.bot_can_manage_roles && !role.managed && role.position < self.bot_top_position
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    /// Guild with a text channel (10, sendable), a text channel (11, not
    /// sendable), a voice channel (20), roles 100 (pos 1), 101 (pos 2),
    /// a managed role 102 and the bot at position 5.
    pub fn sample() -> GuildSnapshot {
        let mut channels = BTreeMap::new();
        channels.insert(
            serenity::ChannelId::new(10),
            ChannelInfo {
                name: "general".into(),
                kind: ChannelKind::Text,
                bot_can_send: true,
                bot_can_manage_messages: true,
            },
        );
        channels.insert(
            serenity::ChannelId::new(11),
            ChannelInfo {
                name: "readonly".into(),
                kind: ChannelKind::Text,
                bot_can_send: false,
                bot_can_manage_messages: false,
            },
        );
        channels.insert(
            serenity::ChannelId::new(20),
            ChannelInfo {
                name: "voice".into(),
                kind: ChannelKind::Voice,
                bot_can_send: true,
                bot_can_manage_messages: false,
            },
        );

        let mut roles = BTreeMap::new();
        for (id, name, position, managed) in [
            (100, "mods", 1, false),
            (101, "members", 2, false),
            (102, "some-bot", 3, true),
        ] {
            roles.insert(
                serenity::RoleId::new(id),
                RoleInfo {
                    name: name.into(),
                    position,
                    managed,
                },
            );
        }

        GuildSnapshot {
            id: 1,
            name: "Test Guild".into(),
            owner_id: 42,
            channels,
            roles,
            bot_top_position: 5,
            bot_can_ban: true,
            bot_can_manage_roles: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_raw_id() {
        let guild = fixtures::sample();
        assert!(guild.has_channel("10"));
        assert!(!guild.has_channel("999"));
        assert!(!guild.has_channel(""));
        assert!(guild.has_role("101"));
        assert!(!guild.has_role("abc"));
    }

    #[test]
    fn test_first_sendable_text_channel() {
        let mut guild = fixtures::sample();
        assert_eq!(guild.first_sendable_text_channel(), Some(serenity::ChannelId::new(10)));

        guild.channels.remove(&serenity::ChannelId::new(10));
        assert_eq!(guild.first_sendable_text_channel(), None);
    }

    #[test]
    fn test_bot_can_assign() {
        let mut guild = fixtures::sample();
        let members = guild.role("101").cloned().unwrap();
        let managed = guild.role("102").cloned().unwrap();
        assert!(guild.bot_can_assign(&members));
        assert!(!guild.bot_can_assign(&managed));

        guild.bot_top_position = 2;
        assert!(!guild.bot_can_assign(&members));
    }
}
