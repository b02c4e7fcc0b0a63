// Per-guild key-value store
// Each guild owns one JSON document: <root>/<guild_id>/store.json

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store document for guild {0} is not a JSON object")]
    Corrupt(serenity::GuildId),
}

/// Async key-value capability, namespaced by guild.
///
/// Methods return boxed futures so the store can live behind `Arc<dyn KvStore>`.
pub trait KvStore: Send + Sync {
    fn get<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StoreError>>;

    fn set<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn delete<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Read a key and deserialize it. A value of the wrong shape is treated as absent.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KvStore,
    guild_id: serenity::GuildId,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(guild_id, key).await? {
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                debug!("Ignoring malformed value for {} in guild {}: {}", key, guild_id, e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Serialize a value and write it under `key`.
pub async fn set_typed<T: Serialize>(
    store: &dyn KvStore,
    guild_id: serenity::GuildId,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value)?;
    store.set(guild_id, key, value).await
}

/// Write bytes to a sibling temp file, then rename over the target.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// File-backed store, one document per guild directory
pub struct FileStore {
    root: PathBuf,
    locks: DashMap<serenity::GuildId, Arc<Mutex<()>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    fn document_path(&self, guild_id: serenity::GuildId) -> PathBuf {
        self.root.join(guild_id.to_string()).join("store.json")
    }

    fn lock(&self, guild_id: serenity::GuildId) -> Arc<Mutex<()>> {
        self.locks.entry(guild_id).or_default().clone()
    }

    async fn read_document(
        &self,
        guild_id: serenity::GuildId,
    ) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(self.document_path(guild_id)).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Corrupt(guild_id)),
        }
    }

    async fn write_document(
        &self,
        guild_id: serenity::GuildId,
        document: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomic(&self.document_path(guild_id), &bytes).await?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StoreError>> {
        Box::pin(async move {
            let lock = self.lock(guild_id);
            let _guard = lock.lock().await;
            let mut document = self.read_document(guild_id).await?;
            Ok(document.remove(key))
        })
    }

    fn set<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let lock = self.lock(guild_id);
            let _guard = lock.lock().await;
            let mut document = self.read_document(guild_id).await?;
            document.insert(key.to_string(), value);
            self.write_document(guild_id, &document).await
        })
    }

    fn delete<'a>(
        &'a self,
        guild_id: serenity::GuildId,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let lock = self.lock(guild_id);
            let _guard = lock.lock().await;
            let mut document = self.read_document(guild_id).await?;
            if document.remove(key).is_some() {
                self.write_document(guild_id, &document).await?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guild(id: u64) -> serenity::GuildId {
        serenity::GuildId::new(id)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.get(guild(1), "a").await.unwrap(), None);

        store.set(guild(1), "a", json!({"x": 1})).await.unwrap();
        assert_eq!(store.get(guild(1), "a").await.unwrap(), Some(json!({"x": 1})));

        store.delete(guild(1), "a").await.unwrap();
        assert_eq!(store.get(guild(1), "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_guilds_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set(guild(1), "prefix", json!("!")).await.unwrap();
        store.set(guild(2), "prefix", json!("?")).await.unwrap();

        assert_eq!(store.get(guild(1), "prefix").await.unwrap(), Some(json!("!")));
        assert_eq!(store.get(guild(2), "prefix").await.unwrap(), Some(json!("?")));
        assert!(dir.path().join("1").join("store.json").exists());
        assert!(dir.path().join("2").join("store.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = dir.path().join("7").join("store.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            store.get(guild(7), "anything").await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_typed_helpers_skip_malformed_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        set_typed(&store, guild(3), "list", &vec!["a".to_string()]).await.unwrap();
        let list: Option<Vec<String>> = get_typed(&store, guild(3), "list").await.unwrap();
        assert_eq!(list, Some(vec!["a".to_string()]));

        store.set(guild(3), "list", json!("not a list")).await.unwrap();
        let list: Option<Vec<String>> = get_typed(&store, guild(3), "list").await.unwrap();
        assert_eq!(list, None);
    }
}
