// Per-command cooldowns keyed by (command, guild, user)

use std::time::{Duration, Instant};

use dashmap::DashMap;
use poise::serenity_prelude as serenity;

#[derive(Debug, Default)]
pub struct Cooldowns {
    expires: DashMap<(&'static str, serenity::GuildId, serenity::UserId), Instant>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `command` may be used again
    pub fn remaining(
        &self,
        command: &'static str,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
    ) -> Option<Duration> {
        let key = (command, guild_id, user_id);
        let expires_at = *self.expires.get(&key)?;
        let now = Instant::now();
        if expires_at <= now {
            self.expires.remove(&key);
            return None;
        }
        Some(expires_at - now)
    }

    pub fn set(
        &self,
        command: &'static str,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        duration: Duration,
    ) {
        self.expires
            .insert((command, guild_id, user_id), Instant::now() + duration);
    }

    /// Start the cooldown unless one is running; returns the wait otherwise.
    pub fn try_start(
        &self,
        command: &'static str,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        duration: Duration,
    ) -> Result<(), Duration> {
        if let Some(left) = self.remaining(command, guild_id, user_id) {
            return Err(left);
        }
        self.set(command, guild_id, user_id, duration);
        Ok(())
    }
}

pub fn wait_message(left: Duration) -> String {
    let secs = left.as_millis().div_ceil(1000).max(1);
    format!("Please wait {}s before using this command again.", secs)
}
