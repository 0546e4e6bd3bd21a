//! Durable key→string settings with typed accessors and a process-wide
//! read cache.
//!
//! The durable half is a trait (`ConfigBackend`) rather than a concrete
//! database type: `abr-db` implements it over `native_db`, keeping this
//! crate generic over the concrete client the way a storage-backed cache
//! stays generic over its transport. Tests here use an in-memory
//! `HashMap` backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// The durable half of the config store. Implementations own whatever
/// storage engine backs it; `abr-db::Store` is the production impl.
#[allow(async_fn_in_trait)]
pub trait ConfigBackend: Send + Sync {
    async fn backend_get(&self, key: &str) -> Result<Option<String>, ConfigError>;
    async fn backend_set(&self, key: &str, value: &str) -> Result<(), ConfigError>;
    async fn backend_delete(&self, key: &str) -> Result<(), ConfigError>;
}

/// Lets a `ConfigStore` share a backend that's also held elsewhere (the
/// common case: the same `Arc<Store>` backs books/requests and config).
impl<T: ConfigBackend + ?Sized> ConfigBackend for Arc<T> {
    async fn backend_get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        (**self).backend_get(key).await
    }

    async fn backend_set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        (**self).backend_set(key, value).await
    }

    async fn backend_delete(&self, key: &str) -> Result<(), ConfigError> {
        (**self).backend_delete(key).await
    }
}

/// Process-wide read-through cache fronting a `ConfigBackend`.
///
/// Concurrency: `set`/`delete` take the write lock, mutate the durable
/// store, then update the cache before releasing it, so any `get` that
/// acquires the lock afterward observes the write. `get` never holds
/// the lock across backend I/O except on a cache miss, where it must
/// anyway.
pub struct ConfigStore<B> {
    backend: B,
    cache: RwLock<HashMap<String, Option<String>>>,
}

impl<B: ConfigBackend> ConfigStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if let Some(hit) = self.cache.read().unwrap().get(key) {
            return Ok(hit.clone());
        }
        let value = self.backend.backend_get(key).await?;
        self.cache
            .write()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub async fn get_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.backend.backend_set(key, value).await?;
        self.cache
            .write()
            .unwrap()
            .insert(key.to_string(), Some(value.to_string()));
        debug!(key, "config: set");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        self.backend.backend_delete(key).await?;
        self.cache.write().unwrap().insert(key.to_string(), None);
        Ok(())
    }

    pub async fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        Ok(match self.get(key).await? {
            Some(v) => v.parse().unwrap_or(default),
            None => default,
        })
    }

    pub async fn set_int(&self, key: &str, value: i64) -> Result<(), ConfigError> {
        self.set(key, &value.to_string()).await
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(match self.get(key).await? {
            Some(v) => v == "true" || v == "1",
            None => default,
        })
    }

    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), ConfigError> {
        self.set(key, if value { "true" } else { "false" }).await
    }

    /// Comma-separated list accessor, used by `prowlarr_categories` /
    /// `prowlarr_indexers`.
    pub async fn get_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        Ok(match self.get(key).await? {
            Some(v) if !v.is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
            _ => Vec::new(),
        })
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        match self.get(key).await? {
            Some(v) => Ok(serde_json::from_str(&v).ok()),
            None => Ok(None),
        }
    }
}

pub mod keys;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MapBackend(Mutex<HashMap<String, String>>);

    impl ConfigBackend for MapBackend {
        async fn backend_get(&self, key: &str) -> Result<Option<String>, ConfigError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        async fn backend_set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn backend_delete(&self, key: &str) -> Result<(), ConfigError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn set_is_visible_to_a_later_get() {
        let store = ConfigStore::new(MapBackend(Mutex::new(HashMap::new())));
        store.set("library_path", "/lib").await.unwrap();
        assert_eq!(store.get("library_path").await.unwrap().as_deref(), Some("/lib"));
    }

    #[tokio::test]
    async fn missing_key_returns_default() {
        let store = ConfigStore::new(MapBackend(Mutex::new(HashMap::new())));
        assert_eq!(store.get_int("min_seeders", 5).await.unwrap(), 5);
        assert!(store.get_bool("auto_download", false).await.unwrap() == false);
    }

    #[tokio::test]
    async fn delete_clears_cache_and_backend() {
        let store = ConfigStore::new(MapBackend(Mutex::new(HashMap::new())));
        store.set("k", "v").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
