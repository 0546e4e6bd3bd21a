use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

/// Sharded per-key lock table for per-identifier single-flight.
/// `try_acquire` never blocks past `timeout`; on contention it returns
/// `SingleFlightError::InProgress` so the caller (the request
/// dispatcher) can report `state=querying` instead of queuing behind
/// the in-flight computation.
///
/// Generalizes a module-scope `querying: set<id>` idiom into an owned,
/// clonable value that can be held by a context struct rather than a
/// global.
pub struct SingleFlight<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SingleFlightError {
    #[error("computation already in progress for this key")]
    InProgress,
}

impl<K> Default for SingleFlight<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

/// RAII guard releasing the per-key slot when dropped.
pub struct SingleFlightGuard {
    _inner: tokio::sync::OwnedMutexGuard<()>,
}

impl<K> SingleFlight<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the per-key slot within `timeout`. Acquisition
    /// failure (P1: at most one query-and-dispatch per identifier) maps
    /// to `InProgress` in O(1), never a blocked call.
    pub async fn try_acquire(
        &self,
        key: K,
        timeout: Duration,
    ) -> Result<SingleFlightGuard, SingleFlightError> {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(SingleFlightGuard { _inner: guard }),
            Err(_) => Err(SingleFlightError::InProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_concurrent_caller_is_told_in_progress() {
        let sf: SingleFlight<&str> = SingleFlight::new();
        let guard = sf.try_acquire("asin", Duration::from_millis(5)).await.unwrap();
        let err = sf.try_acquire("asin", Duration::from_millis(5)).await;
        assert!(matches!(err, Err(SingleFlightError::InProgress)));
        drop(guard);
        assert!(sf.try_acquire("asin", Duration::from_millis(5)).await.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let sf: SingleFlight<&str> = SingleFlight::new();
        let _a = sf.try_acquire("a", Duration::from_millis(5)).await.unwrap();
        assert!(sf.try_acquire("b", Duration::from_millis(5)).await.is_ok());
    }
}
