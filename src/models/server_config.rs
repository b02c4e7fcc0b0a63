// Server configuration model
// One document per guild, stored as camelCase JSON under `config_<guildId>`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PREFIX: &str = ".";
pub const MAX_PREFIX_LEN: usize = 5;
pub const UNKNOWN_SERVER: &str = "Unknown Server";

/// Punishment defaults, also used when clamping out-of-range values
pub const DEFAULT_WARN_THRESHOLD: i64 = 3;
pub const DEFAULT_MUTE_DURATION_MS: i64 = 600_000;
pub const DEFAULT_BAN_THRESHOLD: i64 = 5;
pub const DEFAULT_DELETE_MESSAGE_DAYS: i64 = 1;
pub const MAX_DELETE_MESSAGE_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("configuration document is not a JSON object")]
    NotAnObject,
    #[error("configuration document has no guildId")]
    MissingGuildId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub guild_id: String,
    pub guild_name: String,
    pub prefix: String,
    pub logging: LoggingConfig,
    pub permissions: PermissionConfig,
    pub moderation: ModerationConfig,
    pub features: FeatureConfig,
    pub channels: BTreeMap<String, String>,
    pub roles: RoleConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_log_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_log_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_log_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_log_channel_id: Option<String>,
    pub events: LogEvents,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_channel_id: None,
            error_log_channel_id: None,
            moderation_log_channel_id: None,
            member_log_channel_id: None,
            message_log_channel_id: None,
            voice_log_channel_id: None,
            events: LogEvents::default(),
        }
    }
}

/// Per-event logging switches, all on by default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEvents {
    pub message_delete: bool,
    pub message_edit: bool,
    pub member_join: bool,
    pub member_leave: bool,
    pub member_update: bool,
    pub role_create: bool,
    pub role_delete: bool,
    pub role_update: bool,
    pub channel_create: bool,
    pub channel_delete: bool,
    pub channel_update: bool,
    pub ban_add: bool,
    pub ban_remove: bool,
    pub kick: bool,
    pub warn: bool,
    pub mute: bool,
    pub unmute: bool,
}

impl Default for LogEvents {
    fn default() -> Self {
        Self {
            message_delete: true,
            message_edit: true,
            member_join: true,
            member_leave: true,
            member_update: true,
            role_create: true,
            role_delete: true,
            role_update: true,
            channel_create: true,
            channel_delete: true,
            channel_update: true,
            ban_add: true,
            ban_remove: true,
            kick: true,
            warn: true,
            mute: true,
            unmute: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionConfig {
    pub owner_id: String,
    pub moderator_roles: Vec<String>,
    pub moderator_commands_enabled: bool,
    pub command_permissions: BTreeMap<String, CommandOverride>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            moderator_roles: Vec::new(),
            moderator_commands_enabled: true,
            command_permissions: BTreeMap::new(),
        }
    }
}

/// Per-command permission override (stored, not yet consulted by the gate)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandOverride {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub bypass_owner: bool,
    pub bypass_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModerationConfig {
    pub auto_moderation: AutoModeration,
    pub punishment: Punishment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoModeration {
    pub enabled: bool,
    pub spam_protection: bool,
    pub link_filter: bool,
    pub profanity_filter: bool,
    pub caps_filter: bool,
    pub mention_spam: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Punishment {
    pub warn_threshold: i64,
    /// Milliseconds
    pub mute_duration: i64,
    pub ban_threshold: i64,
    pub auto_delete_messages: bool,
    pub delete_message_days: i64,
}

impl Default for Punishment {
    fn default() -> Self {
        Self {
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            mute_duration: DEFAULT_MUTE_DURATION_MS,
            ban_threshold: DEFAULT_BAN_THRESHOLD,
            auto_delete_messages: true,
            delete_message_days: DEFAULT_DELETE_MESSAGE_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureConfig {
    pub welcome: WelcomeFeature,
    pub goodbye: GoodbyeFeature,
    pub role_restore: ToggleFeature,
    pub auto_role: AutoRoleFeature,
    pub leveling: LevelingFeature,
    pub economy: EconomyFeature,
    pub honeypot: HoneypotFeature,
    pub auto_embed: ToggleFeature,
    pub invite_block: ToggleFeature,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WelcomeFeature {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoodbyeFeature {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToggleFeature {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoRoleFeature {
    pub enabled: bool,
    pub role_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelingFeature {
    pub enabled: bool,
    pub xp_per_message: i64,
    /// Milliseconds
    pub xp_cooldown: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_up_channel_id: Option<String>,
}

impl Default for LevelingFeature {
    fn default() -> Self {
        Self {
            enabled: false,
            xp_per_message: 10,
            xp_cooldown: 60_000,
            level_up_channel_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EconomyFeature {
    pub enabled: bool,
    pub currency_name: String,
    pub currency_symbol: String,
    pub daily_amount: i64,
    pub work_amount: i64,
}

impl Default for EconomyFeature {
    fn default() -> Self {
        Self {
            enabled: false,
            currency_name: "coins".to_string(),
            currency_symbol: "🪙".to_string(),
            daily_amount: 100,
            work_amount: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoneypotFeature {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub delete_message: bool,
    pub auto_ban: bool,
    pub auto_unban: bool,
}

impl Default for HoneypotFeature {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_id: None,
            delete_message: true,
            auto_ban: true,
            auto_unban: false,
        }
    }
}

/// Named role slots (`admin`, `muted`, ...) plus a free-form `custom` map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub custom: BTreeMap<String, String>,
    #[serde(flatten)]
    pub named: BTreeMap<String, String>,
}

/// Top-level keys of a [`ServerConfig`] that can be updated in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    GuildName,
    Prefix,
    Logging,
    Permissions,
    Moderation,
    Features,
    Channels,
    Roles,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::GuildName,
        Section::Prefix,
        Section::Logging,
        Section::Permissions,
        Section::Moderation,
        Section::Features,
        Section::Channels,
        Section::Roles,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::GuildName => "guildName",
            Section::Prefix => "prefix",
            Section::Logging => "logging",
            Section::Permissions => "permissions",
            Section::Moderation => "moderation",
            Section::Features => "features",
            Section::Channels => "channels",
            Section::Roles => "roles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Welcome,
    Goodbye,
    RoleRestore,
    AutoRole,
    Leveling,
    Economy,
    Honeypot,
    AutoEmbed,
    InviteBlock,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 9] = [
        FeatureKey::Welcome,
        FeatureKey::Goodbye,
        FeatureKey::RoleRestore,
        FeatureKey::AutoRole,
        FeatureKey::Leveling,
        FeatureKey::Economy,
        FeatureKey::Honeypot,
        FeatureKey::AutoEmbed,
        FeatureKey::InviteBlock,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FeatureKey::Welcome => "welcome",
            FeatureKey::Goodbye => "goodbye",
            FeatureKey::RoleRestore => "roleRestore",
            FeatureKey::AutoRole => "autoRole",
            FeatureKey::Leveling => "leveling",
            FeatureKey::Economy => "economy",
            FeatureKey::Honeypot => "honeypot",
            FeatureKey::AutoEmbed => "autoEmbed",
            FeatureKey::InviteBlock => "inviteBlock",
        }
    }
}

/// Every location a partial update may target.
///
/// The merge happens at the last segment; intermediate segments are
/// created as empty objects when missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigPath {
    Section(Section),
    LoggingEvents,
    CommandPermissions,
    AutoModeration,
    Punishment,
    Feature(FeatureKey),
    CustomRoles,
}

impl ConfigPath {
    pub fn segments(self) -> Vec<&'static str> {
        match self {
            ConfigPath::Section(section) => vec![section.key()],
            ConfigPath::LoggingEvents => vec!["logging", "events"],
            ConfigPath::CommandPermissions => vec!["permissions", "commandPermissions"],
            ConfigPath::AutoModeration => vec!["moderation", "autoModeration"],
            ConfigPath::Punishment => vec!["moderation", "punishment"],
            ConfigPath::Feature(feature) => vec!["features", feature.key()],
            ConfigPath::CustomRoles => vec!["roles", "custom"],
        }
    }

    pub fn display(self) -> String {
        self.segments().join(".")
    }
}

impl From<Section> for ConfigPath {
    fn from(section: Section) -> Self {
        ConfigPath::Section(section)
    }
}

impl From<FeatureKey> for ConfigPath {
    fn from(feature: FeatureKey) -> Self {
        ConfigPath::Feature(feature)
    }
}

/// A prefix is 1 to 5 characters with no whitespace.
pub fn is_valid_prefix(prefix: &str) -> bool {
    let len = prefix.chars().count();
    (1..=MAX_PREFIX_LEN).contains(&len) && !prefix.chars().any(char::is_whitespace)
}

/// Parse a stored snowflake string. Empty, zero or garbage yields `None`.
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

pub fn channel_id(raw: Option<&String>) -> Option<serenity::ChannelId> {
    raw.and_then(|s| parse_snowflake(s)).map(serenity::ChannelId::new)
}

pub fn role_id(raw: &str) -> Option<serenity::RoleId> {
    parse_snowflake(raw).map(serenity::RoleId::new)
}

impl ServerConfig {
    /// Fresh configuration built from the default template
    pub fn new(guild_id: impl Into<String>, guild_name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            guild_id: guild_id.into(),
            guild_name: guild_name.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            logging: LoggingConfig::default(),
            permissions: PermissionConfig {
                owner_id: owner_id.into(),
                ..Default::default()
            },
            moderation: ModerationConfig::default(),
            features: FeatureConfig::default(),
            channels: BTreeMap::new(),
            roles: RoleConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a config from a raw stored document, backfilling anything missing.
    ///
    /// Missing or null sections come from the default template. A section
    /// whose stored shape cannot be read is reset to its default.
    pub fn from_value(raw: Value) -> Result<Self, SchemaError> {
        let Value::Object(mut map) = raw else {
            return Err(SchemaError::NotAnObject);
        };

        let guild_id = match map.remove("guildId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(SchemaError::MissingGuildId),
        };

        let mut config = ServerConfig::new(guild_id, UNKNOWN_SERVER, "");

        if let Some(name) = take_string(&mut map, "guildName") {
            config.guild_name = name;
        }
        if let Some(prefix) = take_string(&mut map, "prefix") {
            config.prefix = prefix;
        }

        config.logging = take_section(&mut map, "logging", &config.guild_id);
        config.permissions = take_section(&mut map, "permissions", &config.guild_id);
        config.moderation = take_section(&mut map, "moderation", &config.guild_id);
        config.features = take_section(&mut map, "features", &config.guild_id);
        config.channels = take_section(&mut map, "channels", &config.guild_id);
        config.roles = take_section(&mut map, "roles", &config.guild_id);

        if let Some(created) = take_timestamp(&mut map, "createdAt") {
            config.created_at = created;
        }
        if let Some(updated) = take_timestamp(&mut map, "updatedAt") {
            config.updated_at = updated;
        }

        Ok(config)
    }

    pub fn guild(&self) -> Option<serenity::GuildId> {
        parse_snowflake(&self.guild_id).map(serenity::GuildId::new)
    }

    pub fn owner(&self) -> Option<serenity::UserId> {
        parse_snowflake(&self.permissions.owner_id).map(serenity::UserId::new)
    }

    pub fn log_channel(&self) -> Option<serenity::ChannelId> {
        channel_id(self.logging.log_channel_id.as_ref())
    }

    /// Log channel for member join/leave, falling back to the general log channel
    pub fn member_log_channel(&self) -> Option<serenity::ChannelId> {
        channel_id(self.logging.member_log_channel_id.as_ref()).or_else(|| self.log_channel())
    }

    /// Active log channel: `None` when logging is off or unset
    pub fn active_log_channel(&self) -> Option<serenity::ChannelId> {
        if self.logging.enabled {
            self.log_channel()
        } else {
            None
        }
    }

    pub fn moderator_role_ids(&self) -> Vec<serenity::RoleId> {
        self.permissions
            .moderator_roles
            .iter()
            .filter_map(|r| role_id(r))
            .collect()
    }

    pub fn is_owner(&self, user_id: serenity::UserId) -> bool {
        self.owner() == Some(user_id)
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn take_timestamp(map: &mut Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    match map.remove(key) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn take_section<T: DeserializeOwned + Default>(
    map: &mut Map<String, Value>,
    key: &str,
    guild_id: &str,
) -> T {
    match map.remove(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Resetting malformed '{}' section for guild {}: {}", key, guild_id, e);
            T::default()
        }),
    }
}
