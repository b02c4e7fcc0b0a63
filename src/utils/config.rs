// Centralized configuration for DeltaBotz
// Process-wide settings come from the environment (.env is loaded in main)

use std::env;
use std::path::PathBuf;

use poise::serenity_prelude as serenity;
use tracing::warn;

/// Reply used when a command or handler fails unexpectedly
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Reply for users who fail the moderator check
pub const NO_PERMISSION: &str = "You don't have permission to use this command.";

pub const COMMAND_COOLDOWN_SECS: u64 = 10;
pub const HONEYPOT_UNBAN_DELAY_SECS: u64 = 10;
pub const SOFTBAN_UNBAN_DELAY_SECS: u64 = 3;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub error_message: String,
    pub error_log_channel: Option<serenity::ChannelId>,
    pub bot_owner: Option<serenity::UserId>,
    pub data_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("DISCORD_TOKEN must be set")]
    MissingToken,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(EnvError::MissingToken)?;

        let error_message = match lookup("ERR").filter(|m| !m.trim().is_empty()) {
            Some(message) => message,
            None => {
                warn!("ERR is not set, using the default error message");
                DEFAULT_ERROR_MESSAGE.to_string()
            }
        };

        let snowflake = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|id| *id != 0)
        };

        Ok(Self {
            token,
            error_message,
            error_log_channel: snowflake("ERROR_LOG_CHANNEL_ID").map(serenity::ChannelId::new),
            bot_owner: snowflake("BOT_OWNER_ID").map(serenity::UserId::new),
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
        })
    }

    /// Root of the per-guild store and config backups
    pub fn configs_dir(&self) -> PathBuf {
        self.data_dir.join("configs")
    }

    pub fn scheduled_tasks_path(&self) -> PathBuf {
        self.data_dir.join("scheduled_tasks.json")
    }
}

/// Discord embed colors
pub mod colors {
    pub const PRIMARY: u32 = 0x00bfff;
    pub const WARNING: u32 = 0xffa500;
    pub const HONEYPOT: u32 = 0x000000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_token_is_required() {
        assert!(matches!(
            BotConfig::from_lookup(lookup(&[])),
            Err(EnvError::MissingToken)
        ));
        assert!(BotConfig::from_lookup(lookup(&[("DISCORD_TOKEN", " ")])).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.error_message, DEFAULT_ERROR_MESSAGE);
        assert_eq!(config.error_log_channel, None);
        assert_eq!(config.bot_owner, None);
        assert_eq!(config.configs_dir(), PathBuf::from("data").join("configs"));
    }

    #[test]
    fn test_reads_optional_ids() {
        let config = BotConfig::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("ERR", "Oops"),
            ("ERROR_LOG_CHANNEL_ID", "123"),
            ("BOT_OWNER_ID", "not-a-number"),
            ("DATA_DIR", "/tmp/bot"),
        ]))
        .unwrap();
        assert_eq!(config.error_message, "Oops");
        assert_eq!(config.error_log_channel, Some(serenity::ChannelId::new(123)));
        assert_eq!(config.bot_owner, None);
        assert_eq!(config.scheduled_tasks_path(), PathBuf::from("/tmp/bot/scheduled_tasks.json"));
    }
}
