// Config Manager - load, create, save and partially update guild configs
//
// The store entry `config_<guildId>` is the read-of-record. Every save also
// writes `<root>/<guildId>/config.json` as a backup/import copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::server_config::{
    is_valid_prefix, ConfigPath, SchemaError, Section, ServerConfig,
};
use crate::storage::{write_atomic, KvStore, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("mirror file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("invalid prefix {0:?}")]
    InvalidPrefix(String),
    #[error("invalid guild id {0:?}")]
    InvalidGuildId(String),
    #[error("no configuration stored for guild {0}")]
    NotFound(serenity::GuildId),
}

/// Store key holding a guild's configuration
pub fn config_key(guild_id: serenity::GuildId) -> String {
    format!("config_{}", guild_id)
}

/// The live guild facts a default config is seeded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildIdentity {
    pub id: serenity::GuildId,
    pub name: String,
    pub owner_id: serenity::UserId,
}

impl From<&serenity::Guild> for GuildIdentity {
    fn from(guild: &serenity::Guild) -> Self {
        Self {
            id: guild.id,
            name: guild.name.clone(),
            owner_id: guild.owner_id,
        }
    }
}

impl GuildIdentity {
    pub fn from_cache(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Option<Self> {
        ctx.cache.guild(guild_id).map(|g| Self::from(&*g))
    }
}

pub struct ConfigManager {
    store: Arc<dyn KvStore>,
    mirror_root: PathBuf,
    cache: DashMap<serenity::GuildId, ServerConfig>,
    update_locks: DashMap<serenity::GuildId, Arc<Mutex<()>>>,
}

impl ConfigManager {
    pub fn new(store: Arc<dyn KvStore>, mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            mirror_root: mirror_root.into(),
            cache: DashMap::new(),
            update_locks: DashMap::new(),
        }
    }

    fn mirror_path(&self, guild_id: serenity::GuildId) -> PathBuf {
        self.mirror_root.join(guild_id.to_string()).join("config.json")
    }

    fn update_lock(&self, guild_id: serenity::GuildId) -> Arc<Mutex<()>> {
        self.update_locks.entry(guild_id).or_default().clone()
    }

    /// Load a guild's config from the cache, the store, then the mirror file.
    ///
    /// Returns `None` when nothing is stored or loading failed (the cause is logged).
    pub async fn get_server_config(&self, guild_id: serenity::GuildId) -> Option<ServerConfig> {
        match self.load(guild_id).await {
            Ok(config) => config,
            Err(e) => {
                error!("Error loading config for guild {}: {}", guild_id, e);
                None
            }
        }
    }

    async fn load(&self, guild_id: serenity::GuildId) -> Result<Option<ServerConfig>, ConfigError> {
        if let Some(cached) = self.cache.get(&guild_id) {
            return Ok(Some(cached.clone()));
        }

        if let Some(raw) = self.store.get(guild_id, &config_key(guild_id)).await? {
            let config = pin_guild_id(ServerConfig::from_value(raw)?, guild_id);
            self.cache.insert(guild_id, config.clone());
            return Ok(Some(config));
        }

        let Some(raw) = read_mirror(&self.mirror_path(guild_id)).await? else {
            return Ok(None);
        };
        let config = pin_guild_id(ServerConfig::from_value(raw)?, guild_id);
        info!("Importing config for guild {} from its backup file", guild_id);

        match self.try_save(config.clone()).await {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                warn!("Imported config for guild {} could not be stored: {}", guild_id, e);
                Ok(Some(config))
            }
        }
    }

    /// Return the guild's config, creating and saving a default one on first access.
    ///
    /// If the stored value cannot be read, defaults are returned without
    /// being persisted so the stored value is not clobbered.
    pub async fn get_or_create_config(&self, guild: &GuildIdentity) -> ServerConfig {
        match self.load(guild.id).await {
            Ok(Some(config)) => config,
            Ok(None) => self.create_default(guild).await,
            Err(e) => {
                error!("Error loading config for guild {}, using defaults: {}", guild.id, e);
                default_for(guild)
            }
        }
    }

    async fn create_default(&self, guild: &GuildIdentity) -> ServerConfig {
        let lock = self.update_lock(guild.id);
        let _guard = lock.lock().await;

        // another caller may have created it while we waited
        match self.load(guild.id).await {
            Ok(Some(config)) => return config,
            Ok(None) => {}
            Err(e) => {
                error!("Error loading config for guild {}, using defaults: {}", guild.id, e);
                return default_for(guild);
            }
        }

        let config = default_for(guild);
        match self.try_save(config.clone()).await {
            Ok(saved) => {
                info!("Created default config for guild {} ({})", guild.name, guild.id);
                saved
            }
            Err(e) => {
                error!("Error saving default config for guild {}: {}", guild.id, e);
                config
            }
        }
    }

    /// Validate, timestamp and persist a config to the mirror file and the store.
    ///
    /// `false` means nothing took effect for readers.
    pub async fn save_server_config(&self, config: ServerConfig) -> bool {
        let guild_id = config.guild_id.clone();
        match self.try_save(config).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error saving config for guild {}: {}", guild_id, e);
                false
            }
        }
    }

    async fn try_save(&self, config: ServerConfig) -> Result<ServerConfig, ConfigError> {
        let guild_id = config
            .guild()
            .ok_or_else(|| ConfigError::InvalidGuildId(config.guild_id.clone()))?;

        if !is_valid_prefix(&config.prefix) {
            return Err(ConfigError::InvalidPrefix(config.prefix));
        }

        let mut config = ServerConfig::from_value(serde_json::to_value(&config)?)?;

        let mut updated_at = Utc::now().max(config.updated_at);
        if let Some(previous) = self.cache.get(&guild_id) {
            updated_at = updated_at.max(previous.updated_at);
        }
        config.updated_at = updated_at;

        let bytes = serde_json::to_vec_pretty(&config)?;
        let value = serde_json::to_value(&config)?;

        let mirror = self.mirror_path(guild_id);
        let previous = read_bytes(&mirror).await?;
        write_atomic(&mirror, &bytes).await?;

        if let Err(e) = self.store.set(guild_id, &config_key(guild_id), value).await {
            restore_mirror(&mirror, previous.as_deref()).await;
            return Err(e.into());
        }

        self.cache.insert(guild_id, config.clone());
        debug!("Saved config for guild {}", guild_id);
        Ok(config)
    }

    /// Merge `data` into one top-level section. Fails if the guild has no config.
    pub async fn update_config_section(
        &self,
        guild_id: serenity::GuildId,
        section: Section,
        data: Value,
    ) -> bool {
        self.update_nested_section(guild_id, ConfigPath::Section(section), data)
            .await
    }

    /// Shallow-merge `data` into the object at `path`.
    ///
    /// Missing intermediate objects are created. A leaf that is not an
    /// object is replaced outright. The merged document must still be a
    /// well-typed config, or the update is rejected.
    pub async fn update_nested_section(
        &self,
        guild_id: serenity::GuildId,
        path: ConfigPath,
        data: Value,
    ) -> bool {
        match self.try_update(guild_id, path, data).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    "Error updating section {} for guild {}: {}",
                    path.display(),
                    guild_id,
                    e
                );
                false
            }
        }
    }

    /// Load, transform and save a guild's config under its update lock.
    ///
    /// `change` returning `Ok(None)` leaves the config as it is. Fails if
    /// the guild has no config.
    pub async fn update_with<F>(&self, guild_id: serenity::GuildId, change: F) -> bool
    where
        F: FnOnce(&ServerConfig) -> Result<Option<ServerConfig>, ConfigError>,
    {
        match self.try_update_with(guild_id, change).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error updating config for guild {}: {}", guild_id, e);
                false
            }
        }
    }

    async fn try_update(
        &self,
        guild_id: serenity::GuildId,
        path: ConfigPath,
        data: Value,
    ) -> Result<ServerConfig, ConfigError> {
        self.try_update_with(guild_id, |current| apply_at_path(current, path, data).map(Some))
            .await
    }

    async fn try_update_with<F>(&self, guild_id: serenity::GuildId, change: F) -> Result<ServerConfig, ConfigError>
    where
        F: FnOnce(&ServerConfig) -> Result<Option<ServerConfig>, ConfigError>,
    {
        let lock = self.update_lock(guild_id);
        let _guard = lock.lock().await;

        let current = self
            .load(guild_id)
            .await?
            .ok_or(ConfigError::NotFound(guild_id))?;

        match change(&current)? {
            Some(updated) => self.try_save(updated).await,
            None => Ok(current),
        }
    }

    /// Remove a guild's config from the store and its backup file.
    pub async fn delete_server_config(&self, guild_id: serenity::GuildId) -> bool {
        let lock = self.update_lock(guild_id);
        let _guard = lock.lock().await;

        if let Err(e) = self.store.delete(guild_id, &config_key(guild_id)).await {
            error!("Error deleting config for guild {}: {}", guild_id, e);
            return false;
        }
        self.cache.remove(&guild_id);

        match tokio::fs::remove_file(self.mirror_path(guild_id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                error!("Error deleting config file for guild {}: {}", guild_id, e);
                false
            }
        }
    }

    /// Every config that has a guild directory under the mirror root
    pub async fn list_configs(&self) -> Vec<ServerConfig> {
        let mut entries = match tokio::fs::read_dir(&self.mirror_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!("Error listing configs: {}", e);
                return Vec::new();
            }
        };

        let mut guild_ids = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    if let Some(id) = name
                        .to_str()
                        .and_then(crate::models::server_config::parse_snowflake)
                    {
                        guild_ids.push(serenity::GuildId::new(id));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error listing configs: {}", e);
                    break;
                }
            }
        }
        guild_ids.sort();

        let mut configs = Vec::with_capacity(guild_ids.len());
        for guild_id in guild_ids {
            if let Some(config) = self.get_server_config(guild_id).await {
                configs.push(config);
            }
        }
        configs
    }
}

fn default_for(guild: &GuildIdentity) -> ServerConfig {
    ServerConfig::new(guild.id.to_string(), guild.name.clone(), guild.owner_id.to_string())
}

/// `config` with `data` merged at `path`; the result must still be a well-typed config
pub fn apply_at_path(config: &ServerConfig, path: ConfigPath, data: Value) -> Result<ServerConfig, ConfigError> {
    let mut document = serde_json::to_value(config)?;
    merge_at_path(&mut document, &path.segments(), data);
    Ok(serde_json::from_value(document)?)
}

fn pin_guild_id(mut config: ServerConfig, guild_id: serenity::GuildId) -> ServerConfig {
    let expected = guild_id.to_string();
    if config.guild_id != expected {
        warn!(
            "Stored config carries guildId {} under guild {}; keeping {}",
            config.guild_id, guild_id, guild_id
        );
        config.guild_id = expected;
    }
    config
}

async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, ConfigError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Put the mirror back the way it was before a failed save
async fn restore_mirror(path: &Path, previous: Option<&[u8]>) {
    let result = match previous {
        Some(bytes) => write_atomic(path, bytes).await,
        None => match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    };
    if let Err(e) = result {
        warn!("Could not restore config file {}: {}", path.display(), e);
    }
}

async fn read_mirror(path: &Path) -> Result<Option<Value>, ConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Walk `path` from `root`, creating empty objects where a segment is
/// missing or not an object, then shallow-merge `data` at the last segment.
pub fn merge_at_path(root: &mut Value, path: &[&str], data: Value) {
    let Some((last, parents)) = path.split_last() else {
        merge_value(root, data);
        return;
    };

    let mut node = root;
    for key in parents {
        node = ensure_object(node)
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let parent = ensure_object(node);
    match parent.get_mut(*last) {
        Some(existing) => merge_value(existing, data),
        None => {
            parent.insert(last.to_string(), data);
        }
    }
}

fn merge_value(existing: &mut Value, data: Value) {
    match (existing, data) {
        (Value::Object(current), Value::Object(incoming)) => {
            for (key, value) in incoming {
                current.insert(key, value);
            }
        }
        (existing, data) => *existing = data,
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
