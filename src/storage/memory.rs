// In-memory store used by tests

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use serde_json::Value;

use super::store::{KvStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(serenity::GuildId, String), Value>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`delete` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, guild_id: serenity::GuildId, key: &str) -> Option<Value> {
        self.entries
            .get(&(guild_id, key.to_string()))
            .map(|v| v.value().clone())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store unavailable",
            )));
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StoreError>> {
        Box::pin(async move { Ok(self.raw(guild_id, key)) })
    }

    fn set<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            self.entries.insert((guild_id, key.to_string()), value);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            self.entries.remove(&(guild_id, key.to_string()));
            Ok(())
        })
    }
}
