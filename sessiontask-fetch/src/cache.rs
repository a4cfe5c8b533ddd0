//! Cache store abstraction.
//!
//! Tasks read and write payloads by [`CacheKey`]. Storage is pluggable:
//! [`MemoryCacheStore`] keeps entries for the life of the process, and the
//! store crate provides a disk-backed implementation.

use async_trait::async_trait;
use sessiontask_core::{CacheKey, Payload};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::CacheError;

/// Storage for cached response payloads.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up a payload. `Ok(None)` is a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<Payload>, CacheError>;

    /// Stores a payload, replacing any previous entry.
    async fn put(&self, key: &CacheKey, payload: &Payload) -> Result<(), CacheError>;

    /// Removes one entry. Returns true if something was removed.
    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Removes every entry, returning how many were removed.
    async fn clear(&self) -> Result<usize, CacheError>;
}

/// In-process cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, Payload>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Payload>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, payload: &Payload) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.clone(), payload.clone());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}
