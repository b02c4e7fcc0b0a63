// Moderator command gate

use poise::serenity_prelude as serenity;

use crate::models::server_config::ServerConfig;
use crate::utils::config::NO_PERMISSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Reply with the no-permission message
    Deny,
    /// Moderator commands are switched off: say nothing at all
    Silent,
}

impl GateDecision {
    pub fn denial_message(self) -> Option<&'static str> {
        match self {
            GateDecision::Deny => Some(NO_PERMISSION),
            GateDecision::Allow | GateDecision::Silent => None,
        }
    }
}

pub fn has_moderator_role(config: &ServerConfig, roles: &[serenity::RoleId]) -> bool {
    let moderator_roles = config.moderator_role_ids();
    roles.iter().any(|r| moderator_roles.contains(r))
}

/// Owner, global bot owner, or holder of a moderator role
pub fn is_moderator(
    config: &ServerConfig,
    user_id: serenity::UserId,
    roles: &[serenity::RoleId],
    bot_owner: Option<serenity::UserId>,
) -> bool {
    config.is_owner(user_id) || bot_owner == Some(user_id) || has_moderator_role(config, roles)
}

/// Decide whether a moderator command may run for this user.
pub fn moderator_gate(
    config: &ServerConfig,
    user_id: serenity::UserId,
    roles: &[serenity::RoleId],
    bot_owner: Option<serenity::UserId>,
) -> GateDecision {
    if !config.permissions.moderator_commands_enabled {
        return GateDecision::Silent;
    }
    if is_moderator(config, user_id, roles, bot_owner) {
        GateDecision::Allow
    } else {
        GateDecision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: u64 = 42;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::new("1", "Guild", OWNER.to_string());
        config.permissions.moderator_roles = vec!["100".into()];
        config
    }

    fn user(id: u64) -> serenity::UserId {
        serenity::UserId::new(id)
    }

    #[test]
    fn test_owner_and_moderators_allowed() {
        let config = config();
        assert_eq!(moderator_gate(&config, user(OWNER), &[], None), GateDecision::Allow);
        assert_eq!(
            moderator_gate(&config, user(7), &[serenity::RoleId::new(100)], None),
            GateDecision::Allow
        );
        assert_eq!(moderator_gate(&config, user(9), &[], Some(user(9))), GateDecision::Allow);
    }

    #[test]
    fn test_regular_user_denied_with_one_message() {
        let decision = moderator_gate(&config(), user(7), &[serenity::RoleId::new(5)], None);
        assert_eq!(decision, GateDecision::Deny);
        assert_eq!(decision.denial_message(), Some(NO_PERMISSION));
    }

    #[test]
    fn test_disabled_toggle_is_silent_even_for_owner() {
        let mut config = config();
        config.permissions.moderator_commands_enabled = false;

        let decision = moderator_gate(&config, user(OWNER), &[], None);
        assert_eq!(decision, GateDecision::Silent);
        assert_eq!(decision.denial_message(), None);
        assert_eq!(moderator_gate(&config, user(7), &[], None), GateDecision::Silent);
    }
}
