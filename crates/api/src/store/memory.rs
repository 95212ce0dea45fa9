//! In-memory [`MetaStore`] backend backed by `RwLock<HashMap>`.
//!
//! Suitable for tests and single-process deployments. Values do not survive
//! a restart; anything that must (the encrypted credential blob) should live
//! in a persistent backend in production.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{MetaStore, StoreError};

type UserMeta = HashMap<String, HashMap<String, String>>;

/// Thread-safe in-memory per-user key-value store.
///
/// Backed by `Arc<RwLock<..>>` so it is `Clone`, `Send`, and `Sync` — safe
/// to share across `tokio` tasks.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<UserMeta>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values stored for `user_id`. Test convenience.
    pub fn len_for(&self, user_id: &str) -> usize {
        self.inner
            .read()
            .expect("meta store lock poisoned")
            .get(user_id)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.inner.read().expect("meta store lock poisoned");
        Ok(guard.get(user_id).and_then(|m| m.get(key)).cloned())
    }

    async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().expect("meta store lock poisoned");
        guard
            .entry(user_id.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, user_id: &str, key: &str) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().expect("meta store lock poisoned");
        Ok(guard
            .get_mut(user_id)
            .map_or(false, |m| m.remove(key).is_some()))
    }

    async fn list_by_prefix(
        &self,
        user_id: &str,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let guard = self.inner.read().expect("meta store lock poisoned");
        let mut entries: Vec<(String, String)> = guard
            .get(user_id)
            .map(|m| {
                m.iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        // Deterministic order for callers and tests.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}
