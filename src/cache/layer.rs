//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, QueryKey};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the data-access client and the remote store,
/// providing cache-first reads, explicit invalidation and in-place patches.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if fresh and not invalidated, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. On network failure, return stale cache (offline mode)
  /// 4. Update cache with new data
  pub async fn fetch_list<T, K, F, Fut>(
    &self,
    key: &K,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_hash();

    // Check cache first
    if let Some(cached) = self.storage.get_query_result::<T>(&hash)? {
      if !cached.invalidated && !self.is_stale(cached.cached_at) {
        debug!(query = %key.description(), "cache hit");
        return Ok(CacheResult::from_cache(cached.entities, cached.cached_at));
      }

      // Cache is stale, try to fetch from network
      match fetcher().await {
        Ok(data) => {
          self
            .storage
            .store_query_result(&hash, &key.description(), &data)?;
          Ok(CacheResult::from_network(data))
        }
        Err(e) => {
          warn!(query = %key.description(), error = %e, "fetch failed, serving stale cache");
          Ok(CacheResult::offline(cached.entities, cached.cached_at))
        }
      }
    } else {
      // No cache, must fetch from network
      debug!(query = %key.description(), "cache miss");
      let data = fetcher().await?;
      self
        .storage
        .store_query_result(&hash, &key.description(), &data)?;
      Ok(CacheResult::from_network(data))
    }
  }

  /// Fetch a single entity, cached as a one-element query result.
  pub async fn fetch_one<T, K, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let result = self
      .fetch_list(key, || async move { fetcher().await.map(|one| vec![one]) })
      .await?;

    let source = result.source;
    let cached_at = result.cached_at;
    let data = result
      .data
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Cached result for {} is empty", key.description()))?;

    Ok(CacheResult {
      data,
      source,
      cached_at,
    })
  }

  /// Mark a query stale; the next fetch for it goes to the network.
  pub fn invalidate<K: QueryKey>(&self, key: &K) -> Result<()> {
    if self.storage.invalidate(&key.cache_hash())? {
      debug!(query = %key.description(), "invalidated");
    }
    Ok(())
  }

  /// Patch every cached entity of type `T` in place.
  pub fn patch<T: Cacheable>(&self, mut patch: impl FnMut(&mut T) -> bool) -> Result<usize> {
    let changed = self.storage.patch_entities::<T>(&mut patch)?;
    debug!(entity_type = T::entity_type(), changed, "patched");
    Ok(changed)
  }

  /// Remove an entity from every cached query result that lists it.
  pub fn remove<T: Cacheable>(&self, entity_key: &str) -> Result<usize> {
    let affected = self.storage.remove_entity::<T>(entity_key)?;
    debug!(entity_type = T::entity_type(), entity_key, affected, "removed");
    Ok(affected)
  }

  /// Drop every cached entity and query result.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear()?;
    debug!("cache cleared");
    Ok(())
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
    }
  }
}
