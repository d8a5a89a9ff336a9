use crate::shared::{Enrollment, LoaderShared};
use crate::thunk::{LoadResult, Thunk};
use crate::MetricsSnapshot;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use futures_util::future;

/// A thread-safe, synchronous batching loader.
///
/// Cloning is cheap; every clone shares the same cache and the same open
/// batch.
pub struct Loader<K, V, E, H = ahash::RandomState> {
  pub(crate) shared: Arc<LoaderShared<K, V, E, H>>,
}

/// A thread-safe, asynchronous batching loader.
pub struct AsyncLoader<K, V, E, H = ahash::RandomState> {
  pub(crate) shared: Arc<LoaderShared<K, V, E, H>>,
}

impl<K, V, E, H> Clone for Loader<K, V, E, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, E, H> Clone for AsyncLoader<K, V, E, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, E, H> fmt::Debug for Loader<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Loader")
      .field("wait", &self.shared.wait)
      .field("max_batch", &self.shared.max_batch)
      .finish_non_exhaustive()
  }
}

impl<K, V, E, H> fmt::Debug for AsyncLoader<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncLoader")
      .field("wait", &self.shared.wait)
      .field("max_batch", &self.shared.max_batch)
      .finish_non_exhaustive()
  }
}

impl<K, V, E, H> Loader<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Loads a value by key, batching and caching applied automatically.
  /// Blocks the calling thread until the value or error is available.
  pub fn load(&self, key: K) -> LoadResult<V, E> {
    self.load_thunk(key).wait()
  }

  /// Returns a deferred load without blocking.
  ///
  /// Use this when one thread needs to enqueue keys against several loaders
  /// before blocking on any of them: nothing waits until the thunk itself
  /// is consumed.
  pub fn load_thunk(&self, key: K) -> Thunk<K, V, E, H> {
    match self.shared.cache_or_enroll(&key) {
      Enrollment::Cached(value) => Thunk::ready(Ok(value)),
      Enrollment::Enrolled(batch, pos) => Thunk::bound(self.shared.clone(), batch, key, pos),
    }
  }

  /// Loads many keys at once, splitting into appropriately sized batches
  /// depending on how the loader is configured.
  ///
  /// All thunks are requested before any is resolved, so keys destined for
  /// the same open batch coalesce into one fetch call. The returned vector
  /// is positionally aligned with `keys`; duplicate keys resolve to the
  /// same result without being fetched twice.
  pub fn load_all(&self, keys: &[K]) -> Vec<LoadResult<V, E>> {
    let thunks: Vec<_> = keys.iter().map(|key| self.load_thunk(key.clone())).collect();
    thunks.into_iter().map(Thunk::wait).collect()
  }

  /// Primes the cache with the provided key and value. If the key already
  /// exists, no change is made and `false` is returned.
  ///
  /// The value is taken by ownership, so the cached copy can never alias a
  /// value the caller keeps mutating. (To forcefully prime, `clear` the key
  /// first.)
  pub fn prime(&self, key: K, value: V) -> bool {
    self.shared.prime(key, value)
  }

  /// Clears the value at `key` from the cache, if it exists. The next load
  /// of the key will fetch it afresh.
  pub fn clear(&self, key: &K) {
    self.shared.clear(key);
  }

  /// Returns a point-in-time snapshot of the loader's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Converts this synchronous `Loader` into an asynchronous `AsyncLoader`.
  /// This is a zero-cost conversion; both views share one core.
  pub fn to_async(&self) -> AsyncLoader<K, V, E, H> {
    AsyncLoader {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, E, H> AsyncLoader<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Loads a value by key, batching and caching applied automatically.
  pub async fn load(&self, key: K) -> LoadResult<V, E> {
    self.load_thunk(key).await
  }

  /// Returns a deferred load without blocking. The thunk is a `Future`.
  pub fn load_thunk(&self, key: K) -> Thunk<K, V, E, H> {
    match self.shared.cache_or_enroll(&key) {
      Enrollment::Cached(value) => Thunk::ready(Ok(value)),
      Enrollment::Enrolled(batch, pos) => Thunk::bound(self.shared.clone(), batch, key, pos),
    }
  }

  /// Loads many keys at once. All thunks are requested up front so keys
  /// coalesce into as few batches as possible; results come back in input
  /// order.
  pub async fn load_all(&self, keys: &[K]) -> Vec<LoadResult<V, E>> {
    let thunks: Vec<_> = keys.iter().map(|key| self.load_thunk(key.clone())).collect();
    future::join_all(thunks).await
  }

  /// Primes the cache with the provided key and value. If the key already
  /// exists, no change is made and `false` is returned.
  pub fn prime(&self, key: K, value: V) -> bool {
    self.shared.prime(key, value)
  }

  /// Clears the value at `key` from the cache, if it exists.
  pub fn clear(&self, key: &K) {
    self.shared.clear(key);
  }

  /// Returns a point-in-time snapshot of the loader's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Converts this asynchronous `AsyncLoader` into a synchronous `Loader`.
  /// This is a zero-cost conversion; both views share one core.
  pub fn to_sync(&self) -> Loader<K, V, E, H> {
    Loader {
      shared: self.shared.clone(),
    }
  }
}
