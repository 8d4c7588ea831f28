//! Session cache that memoizes fetches by key until explicitly cleared.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::debug;

use super::traits::CacheResult;

struct CachedEntry<T> {
  value: T,
  cached_at: DateTime<Utc>,
}

/// Memo of fetched values for one session.
///
/// Entries never expire on their own; they go away through `invalidate` or
/// `clear`. A failed fetch leaves no entry behind.
pub struct SessionCache<T> {
  entries: Mutex<HashMap<String, CachedEntry<T>>>,
}

impl<T: Clone> SessionCache<T> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Return the cached value for `key`, or run `fetcher` and remember its
  /// result if it succeeds.
  pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some((value, cached_at)) = self.lookup(key)? {
      debug!(key, "session cache hit");
      return Ok(CacheResult::from_cache(value, cached_at));
    }

    debug!(key, "session cache miss");
    let value = fetcher().await?;
    let cached_at = self.store(key, value.clone())?;
    Ok(CacheResult::from_network(value, cached_at))
  }

  /// Cached value for `key` without fetching.
  pub fn get(&self, key: &str) -> Result<Option<CacheResult<T>>> {
    Ok(
      self
        .lookup(key)?
        .map(|(value, cached_at)| CacheResult::from_cache(value, cached_at)),
    )
  }

  fn lookup(&self, key: &str) -> Result<Option<(T, DateTime<Utc>)>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      entries
        .get(key)
        .map(|entry| (entry.value.clone(), entry.cached_at)),
    )
  }

  /// Put a value in the cache, replacing any previous entry.
  pub fn store(&self, key: &str, value: T) -> Result<DateTime<Utc>> {
    let cached_at = Utc::now();
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(key.to_string(), CachedEntry { value, cached_at });
    Ok(cached_at)
  }

  /// Drop one entry. Returns whether it was present.
  pub fn invalidate(&self, key: &str) -> Result<bool> {
    let removed = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(key)
      .is_some();
    debug!(key, removed, "session cache invalidate");
    Ok(removed)
  }

  /// Drop every entry.
  pub fn clear(&self) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    debug!("session cache cleared");
    Ok(())
  }

  #[cfg(test)]
  pub fn contains(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .map(|entries| entries.contains_key(key))
      .unwrap_or(false)
  }

  pub fn cached_at(&self, key: &str) -> Option<DateTime<Utc>> {
    self
      .entries
      .lock()
      .ok()
      .and_then(|entries| entries.get(key).map(|e| e.cached_at))
  }
}

impl<T: Clone> Default for SessionCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[tokio::test]
  async fn test_second_fetch_is_served_from_cache() {
    let cache = SessionCache::new();
    let calls = AtomicUsize::new(0);

    let first = cache
      .get_or_fetch("master.csv", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1, 2, 3])
      })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .get_or_fetch("master.csv", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![9])
      })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, vec![1, 2, 3]);
    assert_eq!(second.cached_at, first.cached_at);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_fetch_is_not_cached() {
    let cache: SessionCache<u32> = SessionCache::new();

    let result = cache
      .get_or_fetch("master.csv", || async { Err(eyre!("GET master.csv failed: 503")) })
      .await;
    assert!(result.is_err());
    assert!(!cache.contains("master.csv"));

    let result = cache
      .get_or_fetch("master.csv", || async { Ok(7) })
      .await
      .unwrap();
    assert_eq!(result.data, 7);
    assert_eq!(result.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_invalidate_and_clear() {
    let cache = SessionCache::new();
    cache.store("a", 1).unwrap();
    cache.store("b", 2).unwrap();

    assert!(cache.invalidate("a").unwrap());
    assert!(!cache.invalidate("a").unwrap());
    assert!(cache.contains("b"));
    assert!(cache.cached_at("b").is_some());

    cache.clear().unwrap();
    assert!(!cache.contains("b"));
    assert!(cache.cached_at("b").is_none());

    let refetched = cache.get_or_fetch("b", || async { Ok(3) }).await.unwrap();
    assert_eq!(refetched.source, CacheSource::Network);
    assert_eq!(refetched.data, 3);
  }
}
