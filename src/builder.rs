use crate::error::BuildError;
use crate::fetcher::{FetchResult, Fetcher};
use crate::handles::{AsyncLoader, Loader};
use crate::metrics::Metrics;
use crate::shared::{LoaderShared, LoaderState};
use crate::TaskSpawner;

use core::fmt;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// The debounce window applied when `wait` is never called.
const DEFAULT_WAIT: Duration = Duration::from_millis(10);

/// A builder for creating `Loader` and `AsyncLoader` instances.
pub struct LoaderBuilder<K, V, E, H = ahash::RandomState> {
  pub(crate) wait: Duration,
  pub(crate) max_batch: usize,
  pub(crate) hasher: H,
  fetcher: Option<Fetcher<K, V, E>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  _key_marker: PhantomData<K>,
  _value_marker: PhantomData<V>,
  _error_marker: PhantomData<E>,
}

// Manual Debug implementation for LoaderBuilder.
impl<K, V, E, H> fmt::Debug for LoaderBuilder<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoaderBuilder")
      .field("wait", &self.wait)
      .field("max_batch", &self.max_batch)
      .field("has_fetcher", &self.fetcher.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
// This impl block has no restrictive bounds on K, V, or E.
impl<K, V, E, H> LoaderBuilder<K, V, E, H> {
  /// Sets how long a non-full batch stays open after its first key lands.
  ///
  /// Keys requested within this window (by any thread or task) are
  /// coalesced into one fetch call. Defaults to 10 milliseconds.
  pub fn wait(mut self, wait: Duration) -> Self {
    self.wait = wait;
    self
  }

  /// Limits the number of keys sent in one fetch call.
  ///
  /// A batch that reaches this size closes immediately instead of waiting
  /// for the debounce window. `0` (the default) means no limit; batches
  /// then only ever close via the timer.
  pub fn max_batch(mut self, max_batch: usize) -> Self {
    self.max_batch = max_batch;
    self
  }

  /// Sets the synchronous fetch callback.
  ///
  /// The callback receives the batch's ordered, de-duplicated keys and must
  /// return values positionally aligned with them, plus the batch's errors.
  pub fn fetch(mut self, f: impl Fn(&[K]) -> FetchResult<V, E> + Send + Sync + 'static) -> Self {
    self.fetcher = Some(Fetcher::Sync(Arc::new(f)));
    self
  }

  /// Sets the asynchronous fetch callback.
  ///
  /// Same contract as [`fetch`](Self::fetch); the callback owns the key
  /// vector so the returned future can outlive the call.
  pub fn async_fetch<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<V, E>> + Send + 'static,
  {
    let fetch_fn =
      move |keys| Box::pin(f(keys)) as Pin<Box<dyn Future<Output = FetchResult<V, E>> + Send>>;
    self.fetcher = Some(Fetcher::Async(Arc::new(fetch_fn)));
    self
  }

  /// Sets the task spawner used to run async fetch callbacks.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }
}

// --- Constructors ---
impl<K, V, E> LoaderBuilder<K, V, E, ahash::RandomState> {
  /// Creates a new `LoaderBuilder` with default settings.
  pub fn new() -> Self {
    Self::with_hasher(ahash::RandomState::default())
  }
}

impl<K, V, E, H: BuildHasher> LoaderBuilder<K, V, E, H> {
  /// Creates a new `LoaderBuilder` whose per-key cache uses the given
  /// hasher.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      wait: DEFAULT_WAIT,
      max_batch: 0,
      hasher,
      fetcher: None,
      spawner: None,
      _key_marker: PhantomData,
      _value_marker: PhantomData,
      _error_marker: PhantomData,
    }
  }
}

impl<K, V, E> Default for LoaderBuilder<K, V, E, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
// This impl block carries the full set of trait bounds required to actually
// construct a loader, including `'static` for the timer thread.
impl<K, V, E, H> LoaderBuilder<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a synchronous `Loader`.
  pub fn build(mut self) -> Result<Loader<K, V, E, H>, BuildError> {
    let shared = self.build_shared_core()?;
    Ok(Loader { shared })
  }

  /// Builds an asynchronous `AsyncLoader`.
  pub fn build_async(mut self) -> Result<AsyncLoader<K, V, E, H>, BuildError> {
    let shared = self.build_shared_core()?;
    Ok(AsyncLoader { shared })
  }

  /// Central logic to construct the shared core of the loader.
  pub(crate) fn build_shared_core(&mut self) -> Result<Arc<LoaderShared<K, V, E, H>>, BuildError> {
    let fetcher = self.fetcher.take().ok_or(BuildError::FetchRequired)?;

    let mut spawner = self.spawner.take();
    if matches!(fetcher, Fetcher::Async(_)) && spawner.is_none() {
      #[cfg(feature = "tokio")]
      {
        spawner = Some(Arc::new(crate::runtime::TokioSpawner::new()));
      }
      #[cfg(not(feature = "tokio"))]
      {
        return Err(BuildError::SpawnerRequired);
      }
    }

    Ok(Arc::new(LoaderShared {
      state: Mutex::new(LoaderState {
        cache: HashMap::with_hasher(self.hasher.clone()),
        batch: None,
      }),
      fetcher,
      wait: self.wait,
      max_batch: self.max_batch,
      metrics: Arc::new(Metrics::new()),
      spawner,
    }))
  }
}
