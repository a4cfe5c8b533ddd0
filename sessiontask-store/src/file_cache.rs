//! Disk-backed cache store.
//!
//! Each entry lives in its own file, `<dir>/<cache key>.json`:
//!
//! ```json
//! { "stored_at": "2026-01-01T00:00:00Z", "payload": { ... } }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sessiontask_core::{CacheKey, Payload};
use sessiontask_fetch::{CacheError, CacheStore};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_cache_dir, load_json_if_exists, save_json};

/// One stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    /// The cached payload.
    pub payload: Payload,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(payload: Payload) -> Self {
        Self {
            stored_at: Utc::now(),
            payload,
        }
    }
}

/// Cache store keeping one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store in the default cache directory.
    pub fn open_default() -> Self {
        Self::new(default_cache_dir().join("responses"))
    }

    /// Returns the store's directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing `key`.
    pub fn path_for(&self, key: &CacheKey) -> Result<PathBuf, StoreError> {
        let name = key.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::InvalidKey(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Reads the full entry for `key`, including its timestamp.
    pub async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        load_json_if_exists(&self.path_for(key)?).await
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entry_paths().await?.len())
    }

    async fn entry_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Payload>, CacheError> {
        let entry = self.entry(key).await?;
        debug!(key = %key, hit = entry.is_some(), "File cache lookup");
        Ok(entry.map(|e| e.payload))
    }

    async fn put(&self, key: &CacheKey, payload: &Payload) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        save_json(&path, &CacheEntry::new(payload.clone())).await?;
        debug!(key = %key, "File cache write");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let paths = self.entry_paths().await?;
        for path in &paths {
            tokio::fs::remove_file(path).await?;
        }
        info!(dir = %self.dir.display(), removed = paths.len(), "Cleared file cache");
        Ok(paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileCacheStore) {
        let temp = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp.path().join("responses"));
        (temp, store)
    }

    #[tokio::test]
    async fn test_missing_entry_is_miss() {
        let (_temp, store) = store();
        assert!(store.get(&CacheKey::new("abc")).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_temp, store) = store();
        let key = CacheKey::new("abc");

        store.put(&key, &json!({"items": [1]})).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(json!({"items": [1]})));
        assert!(store.dir().join("abc.json").exists());
        let entry = store.entry(&key).await.unwrap().unwrap();
        assert!(entry.stored_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_error() {
        let (_temp, store) = store();
        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join("abc.json"), "not json")
            .await
            .unwrap();

        let result = store.get(&CacheKey::new("abc")).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (_temp, store) = store();
        let result = store.put(&CacheKey::new("../escape"), &json!(1)).await;
        assert!(matches!(result, Err(CacheError::Other(_))));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (_temp, store) = store();
        store.put(&CacheKey::new("a"), &json!(1)).await.unwrap();
        store.put(&CacheKey::new("b"), &json!(2)).await.unwrap();

        assert!(store.remove(&CacheKey::new("a")).await.unwrap());
        assert!(!store.remove(&CacheKey::new("a")).await.unwrap());
        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
