// Config Validator - cross-checks a config against live guild state
//
// Validation and repair are pure: they read a GuildSnapshot and never touch
// Discord or the store.

use crate::models::guild_snapshot::{ChannelKind, GuildSnapshot};
use crate::models::server_config::{
    is_valid_prefix, ServerConfig, DEFAULT_BAN_THRESHOLD, DEFAULT_DELETE_MESSAGE_DAYS,
    DEFAULT_MUTE_DURATION_MS, DEFAULT_PREFIX, DEFAULT_WARN_THRESHOLD, MAX_DELETE_MESSAGE_DAYS,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Check an optional channel reference. `required` marks a channel whose
    /// absence is an error (an enabled feature depends on it).
    fn channel(&mut self, guild: &GuildSnapshot, label: &str, raw: Option<&String>, required: bool) {
        let Some(raw) = raw.filter(|s| !s.is_empty()) else {
            if required {
                self.error(format!("{} is enabled but no channel is set", label));
            }
            return;
        };

        match guild.channel(raw) {
            None => self.warn(format!("{} channel does not exist", label)),
            Some(info) if info.kind != ChannelKind::Text => {
                self.error(format!("{} channel must be a text channel", label))
            }
            Some(info) if !info.bot_can_send => {
                self.warn(format!("Bot lacks permissions in {} channel", label.to_lowercase()))
            }
            Some(_) => {}
        }
    }
}

/// Check every channel and role reference plus the numeric settings.
pub fn validate_config(guild: &GuildSnapshot, config: &ServerConfig) -> ValidationReport {
    let mut f = Findings::default();

    if config.guild_id.is_empty() {
        f.error("Guild ID is required");
    }
    if config.guild_name.is_empty() {
        f.error("Guild name is required");
    }
    if !is_valid_prefix(&config.prefix) {
        f.error("Prefix must be 1-5 characters without spaces");
    }

    let logging = &config.logging;
    if logging.enabled && logging.log_channel_id.is_none() {
        f.warn("Logging is enabled but no log channel is set");
    }
    for (label, raw) in [
        ("Log", logging.log_channel_id.as_ref()),
        ("Error log", logging.error_log_channel_id.as_ref()),
        ("Moderation log", logging.moderation_log_channel_id.as_ref()),
        ("Member log", logging.member_log_channel_id.as_ref()),
        ("Message log", logging.message_log_channel_id.as_ref()),
    ] {
        f.channel(guild, label, raw, false);
    }
    if let Some(raw) = logging.voice_log_channel_id.as_ref() {
        if !guild.has_channel(raw) {
            f.warn("Voice log channel does not exist");
        }
    }

    if config.permissions.owner_id.is_empty() {
        f.warn("No owner ID set - some features may not work");
    }
    for role in &config.permissions.moderator_roles {
        if !guild.has_role(role) {
            f.warn(format!("Role {} does not exist", role));
        }
    }
    for (command, rule) in &config.permissions.command_permissions {
        for role in &rule.roles {
            if !guild.has_role(role) {
                f.warn(format!("Role {} used by command {} does not exist", role, command));
            }
        }
    }

    for (name, id) in &config.channels {
        if !guild.has_channel(id) {
            f.warn(format!("Channel {} ({}) does not exist", name, id));
        }
    }
    for (name, id) in &config.roles.named {
        if !guild.has_role(id) {
            f.warn(format!("Role {} ({}) does not exist", name, id));
        }
    }
    for (name, id) in &config.roles.custom {
        if !guild.has_role(id) {
            f.warn(format!("Custom role {} ({}) does not exist", name, id));
        }
    }

    let features = &config.features;
    if features.honeypot.enabled {
        f.channel(guild, "Honeypot", features.honeypot.channel_id.as_ref(), true);
        if let Some(info) = features.honeypot.channel_id.as_deref().and_then(|c| guild.channel(c)) {
            if features.honeypot.delete_message && !info.bot_can_manage_messages {
                f.warn("Bot cannot delete messages in the honeypot channel");
            }
        }
        if features.honeypot.auto_ban && !guild.bot_can_ban {
            f.warn("Bot lacks the Ban Members permission needed by the honeypot");
        }
    }
    if features.welcome.enabled {
        f.channel(guild, "Welcome", features.welcome.channel_id.as_ref(), true);
    }
    if let Some(role) = features.welcome.role_id.as_deref() {
        if !guild.has_role(role) {
            f.warn(format!("Welcome role {} does not exist", role));
        }
    }
    if features.goodbye.enabled {
        f.channel(guild, "Goodbye", features.goodbye.channel_id.as_ref(), true);
    }
    if features.leveling.enabled {
        f.channel(guild, "Level-up", features.leveling.level_up_channel_id.as_ref(), false);
    }
    if features.auto_role.enabled && features.auto_role.role_ids.is_empty() {
        f.warn("Auto-role is enabled but no roles are set");
    }
    for role_id in &features.auto_role.role_ids {
        match guild.role(role_id) {
            None => f.warn(format!("Auto-role {} does not exist", role_id)),
            Some(role) if !guild.bot_can_assign(role) => f.warn(format!(
                "Bot cannot assign role {} - role is higher than bot's highest role",
                role.name
            )),
            Some(_) => {}
        }
    }
    if (features.role_restore.enabled || features.auto_role.enabled) && !guild.bot_can_manage_roles {
        f.warn("Bot lacks the Manage Roles permission");
    }

    let punishment = &config.moderation.punishment;
    if punishment.warn_threshold < 0 {
        f.error("Warn threshold cannot be negative");
    }
    if punishment.mute_duration < 0 {
        f.error("Mute duration cannot be negative");
    }
    if punishment.ban_threshold < 0 {
        f.error("Ban threshold cannot be negative");
    }
    if !(0..=MAX_DELETE_MESSAGE_DAYS).contains(&punishment.delete_message_days) {
        f.error("Delete message days must be between 0 and 7");
    }

    ValidationReport {
        valid: f.errors.is_empty(),
        errors: f.errors,
        warnings: f.warnings,
    }
}

/// Repair dangling references and out-of-range numbers.
///
/// Running it on its own output changes nothing.
pub fn fix_config(guild: &GuildSnapshot, config: &ServerConfig) -> ServerConfig {
    let mut fixed = config.clone();

    if fixed.guild_name.is_empty() {
        fixed.guild_name = guild.name.clone();
    }
    if !is_valid_prefix(&fixed.prefix) {
        fixed.prefix = DEFAULT_PREFIX.to_string();
    }

    let logging = &mut fixed.logging;
    let log_channel_ok = logging
        .log_channel_id
        .as_deref()
        .and_then(|id| guild.channel(id))
        .is_some_and(|c| c.kind == ChannelKind::Text && c.bot_can_send);
    if !log_channel_ok {
        if logging.enabled {
            match guild.first_sendable_text_channel() {
                Some(channel) => logging.log_channel_id = Some(channel.to_string()),
                None => {
                    logging.enabled = false;
                    logging.log_channel_id = None;
                }
            }
        } else {
            strip_channel(guild, &mut logging.log_channel_id);
        }
    }
    strip_channel(guild, &mut logging.error_log_channel_id);
    strip_channel(guild, &mut logging.moderation_log_channel_id);
    strip_channel(guild, &mut logging.member_log_channel_id);
    strip_channel(guild, &mut logging.message_log_channel_id);
    strip_channel(guild, &mut logging.voice_log_channel_id);

    fixed.permissions.moderator_roles.retain(|id| guild.has_role(id));
    for rule in fixed.permissions.command_permissions.values_mut() {
        rule.roles.retain(|id| guild.has_role(id));
    }

    fixed.channels.retain(|_, id| guild.has_channel(id));
    fixed.roles.named.retain(|_, id| guild.has_role(id));
    fixed.roles.custom.retain(|_, id| guild.has_role(id));

    let features = &mut fixed.features;
    strip_channel(guild, &mut features.welcome.channel_id);
    strip_channel(guild, &mut features.goodbye.channel_id);
    strip_channel(guild, &mut features.honeypot.channel_id);
    strip_channel(guild, &mut features.leveling.level_up_channel_id);
    if features.welcome.role_id.as_deref().is_some_and(|id| !guild.has_role(id)) {
        features.welcome.role_id = None;
    }
    features.auto_role.role_ids.retain(|id| guild.has_role(id));

    let punishment = &mut fixed.moderation.punishment;
    if punishment.warn_threshold < 0 {
        punishment.warn_threshold = DEFAULT_WARN_THRESHOLD;
    }
    if punishment.mute_duration < 0 {
        punishment.mute_duration = DEFAULT_MUTE_DURATION_MS;
    }
    if punishment.ban_threshold < 0 {
        punishment.ban_threshold = DEFAULT_BAN_THRESHOLD;
    }
    if !(0..=MAX_DELETE_MESSAGE_DAYS).contains(&punishment.delete_message_days) {
        punishment.delete_message_days = DEFAULT_DELETE_MESSAGE_DAYS;
    }

    fixed
}

fn strip_channel(guild: &GuildSnapshot, slot: &mut Option<String>) {
    if slot.as_deref().is_some_and(|id| !guild.has_channel(id)) {
        *slot = None;
    }
}

/// Score a config from 0 to 100 by deducting points for unmet best practices.
pub fn get_health_score(config: &ServerConfig) -> u8 {
    let mut score: i32 = 100;
    let mut deduct = |condition: bool, points: i32| {
        if condition {
            score -= points;
        }
    };

    deduct(config.guild_id.is_empty(), 5);
    deduct(config.guild_name.is_empty(), 5);
    deduct(config.prefix.is_empty(), 5);
    deduct(config.permissions.owner_id.is_empty(), 5);

    let logging = &config.logging;
    deduct(logging.enabled && logging.log_channel_id.is_none(), 10);
    deduct(logging.enabled && logging.error_log_channel_id.is_none(), 10);

    deduct(config.permissions.moderator_roles.is_empty(), 7);

    let features = &config.features;
    deduct(features.welcome.enabled && features.welcome.channel_id.is_none(), 5);
    deduct(features.goodbye.enabled && features.goodbye.channel_id.is_none(), 5);
    deduct(features.auto_role.enabled && features.auto_role.role_ids.is_empty(), 5);
    deduct(features.honeypot.enabled && features.honeypot.channel_id.is_none(), 5);

    let auto_mod = &config.moderation.auto_moderation;
    deduct(auto_mod.enabled && !auto_mod.spam_protection, 5);

    let punishment = &config.moderation.punishment;
    deduct(punishment.warn_threshold <= 0, 5);
    deduct(punishment.ban_threshold <= 0, 5);

    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild_snapshot::fixtures;

    fn base() -> ServerConfig {
        let mut config = ServerConfig::new("1", "Test Guild", "42");
        config.logging.log_channel_id = Some("10".into());
        config.logging.error_log_channel_id = Some("10".into());
        config.permissions.moderator_roles = vec!["100".into()];
        config
    }

    #[test]
    fn test_clean_config_is_valid() {
        let report = validate_config(&fixtures::sample(), &base());
        assert!(report.valid, "{:?}", report);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_missing_references_are_warnings() {
        let mut config = base();
        config.logging.log_channel_id = Some("999".into());
        config.permissions.moderator_roles.push("555".into());
        config.roles.custom.insert("vip".into(), "556".into());

        let report = validate_config(&fixtures::sample(), &config);
        assert!(report.valid);
        assert!(report.warnings.contains(&"Log channel does not exist".to_string()));
        assert!(report.warnings.contains(&"Role 555 does not exist".to_string()));
        assert!(report.warnings.iter().any(|w| w.starts_with("Custom role vip")));
    }

    #[test]
    fn test_hard_errors() {
        let mut config = base();
        config.features.honeypot.enabled = true;
        config.features.welcome.enabled = true;
        config.features.welcome.channel_id = Some("20".into());
        config.moderation.punishment.delete_message_days = 9;
        config.moderation.punishment.warn_threshold = -1;

        let report = validate_config(&fixtures::sample(), &config);
        assert!(!report.valid);
        assert!(report.errors.contains(&"Honeypot is enabled but no channel is set".to_string()));
        assert!(report.errors.contains(&"Welcome channel must be a text channel".to_string()));
        assert!(report.errors.contains(&"Delete message days must be between 0 and 7".to_string()));
        assert!(report.errors.contains(&"Warn threshold cannot be negative".to_string()));
    }

    #[test]
    fn test_bot_permission_is_a_warning() {
        let mut config = base();
        config.logging.log_channel_id = Some("11".into());
        let report = validate_config(&fixtures::sample(), &config);
        assert!(report.valid);
        assert!(report.warnings.contains(&"Bot lacks permissions in log channel".to_string()));
    }

    #[test]
    fn test_fix_replaces_bad_log_channel() {
        let mut config = base();
        config.logging.log_channel_id = Some("20".into());
        let fixed = fix_config(&fixtures::sample(), &config);
        assert_eq!(fixed.logging.log_channel_id.as_deref(), Some("10"));
        assert!(fixed.logging.enabled);
    }

    #[test]
    fn test_fix_disables_logging_without_usable_channel() {
        let mut guild = fixtures::sample();
        guild.channels.clear();
        let fixed = fix_config(&guild, &base());
        assert!(!fixed.logging.enabled);
        assert_eq!(fixed.logging.log_channel_id, None);
        assert_eq!(fixed.logging.error_log_channel_id, None);
    }

    #[test]
    fn test_fix_strips_dead_references_and_clamps() {
        let mut config = base();
        config.permissions.moderator_roles = vec!["100".into(), "555".into()];
        config.features.auto_role.role_ids = vec!["556".into(), "101".into()];
        config.features.honeypot.channel_id = Some("999".into());
        config.channels.insert("rules".into(), "998".into());
        config.channels.insert("general".into(), "10".into());
        config.roles.custom.insert("ghost".into(), "557".into());
        config.moderation.punishment.mute_duration = -5;
        config.moderation.punishment.delete_message_days = 30;

        let fixed = fix_config(&fixtures::sample(), &config);
        assert_eq!(fixed.permissions.moderator_roles, vec!["100".to_string()]);
        assert_eq!(fixed.features.auto_role.role_ids, vec!["101".to_string()]);
        assert_eq!(fixed.features.honeypot.channel_id, None);
        assert_eq!(fixed.channels.len(), 1);
        assert!(fixed.roles.custom.is_empty());
        assert_eq!(fixed.moderation.punishment.mute_duration, DEFAULT_MUTE_DURATION_MS);
        assert_eq!(fixed.moderation.punishment.delete_message_days, DEFAULT_DELETE_MESSAGE_DAYS);
    }

    #[test]
    fn test_fix_is_idempotent() {
        let guild = fixtures::sample();
        let mut config = base();
        config.logging.log_channel_id = Some("404".into());
        config.permissions.moderator_roles = vec!["555".into()];
        config.features.welcome.role_id = Some("1".into());
        config.prefix = "toolong".into();
        config.moderation.punishment.ban_threshold = -3;

        let once = fix_config(&guild, &config);
        let twice = fix_config(&guild, &once);
        assert_eq!(once, twice);
        assert!(validate_config(&guild, &once).valid);
    }

    #[test]
    fn test_health_score() {
        assert_eq!(get_health_score(&base()), 100);

        let fresh = ServerConfig::new("1", "Test", "");
        // no owner (5), logging without both channels (20), no mod roles (7)
        assert_eq!(get_health_score(&fresh), 68);

        let mut bad = fresh.clone();
        bad.features.honeypot.enabled = true;
        bad.moderation.punishment.warn_threshold = 0;
        bad.moderation.punishment.ban_threshold = 0;
        assert_eq!(get_health_score(&bad), 53);
    }
}
