use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// A keyed cache mapping `K` to `(V, inserted_at)`. Point-wise inserts
/// and lookups are race-safe.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value only if `now - inserted <= ttl`.
    pub async fn lookup(&self, key: &K, ttl: Duration) -> Option<V> {
        let entries = self.entries.read().await;
        let (value, inserted_at) = entries.get(key)?;
        if inserted_at.elapsed() <= ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    /// Unconditional write with the current timestamp.
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (value, Instant::now()));
    }

    /// Removes entries older than `ttl`.
    pub async fn evict_expired(&self, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= ttl);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_respects_ttl_boundary() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.insert("k", 1).await;
        assert_eq!(cache.lookup(&"k", Duration::from_secs(60)).await, Some(1));
        assert_eq!(cache.lookup(&"missing", Duration::from_secs(60)).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_evictable() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.insert("k", 1).await;
        // a zero-duration TTL means "now" must be strictly after insert,
        // which is always true once any await has elapsed.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.lookup(&"k", Duration::from_millis(1)).await, None);
        cache.evict_expired(Duration::from_millis(1)).await;
        assert!(cache.is_empty().await);
    }
}
