use crate::batch::Batch;
use crate::fetcher::Fetcher;
use crate::metrics::Metrics;
use crate::runtime::TaskSpawner;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The mutable state of a loader: the per-key cache and the current open
/// batch slot. Both live behind one mutex; critical sections stay short and
/// the lock is never held while blocking on a batch or running the fetch
/// callback.
pub(crate) struct LoaderState<K, V, E, H> {
  /// `None` in a slot means the key was fetched and had no value; it is a
  /// cached result like any other and will not be fetched again.
  pub(crate) cache: HashMap<K, Option<Arc<V>>, H>,
  pub(crate) batch: Option<Arc<Batch<K, V, E>>>,
}

/// The internal, thread-safe core shared by `Loader` and `AsyncLoader`.
pub(crate) struct LoaderShared<K, V, E, H> {
  pub(crate) state: Mutex<LoaderState<K, V, E, H>>,
  pub(crate) fetcher: Fetcher<K, V, E>,
  /// How long a non-full batch stays open after its first key arrives.
  pub(crate) wait: Duration,
  /// Maximum keys per fetch call; 0 = no limit.
  pub(crate) max_batch: usize,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) spawner: Option<Arc<dyn TaskSpawner>>,
}

/// The outcome of looking a key up: either it was already cached, or it is
/// now enrolled in a batch at a fixed position.
pub(crate) enum Enrollment<K, V, E> {
  Cached(Option<Arc<V>>),
  Enrolled(Arc<Batch<K, V, E>>, usize),
}

impl<K, V, E, H> LoaderShared<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Consults the cache and, on a miss, enrolls the key in the open batch,
  /// opening a fresh one if none exists. Returns without blocking.
  pub(crate) fn cache_or_enroll(self: &Arc<Self>, key: &K) -> Enrollment<K, V, E> {
    let mut state = self.state.lock();

    if let Some(cached) = state.cache.get(key) {
      self.metrics.hits.fetch_add(1, Ordering::Relaxed);
      return Enrollment::Cached(cached.clone());
    }
    self.metrics.misses.fetch_add(1, Ordering::Relaxed);

    let batch = match &state.batch {
      Some(batch) => batch.clone(),
      None => {
        let batch = Arc::new(Batch::new());
        state.batch = Some(batch.clone());
        batch
      }
    };

    let pos = self.enroll(&mut state, &batch, key);
    Enrollment::Enrolled(batch, pos)
  }

  /// Returns the key's position in the batch, appending it if absent. The
  /// linear scan is fine here: batches are bounded by `max_batch` or by how
  /// many distinct keys one debounce window can collect.
  ///
  /// Called with the loader lock held. First-ever append arms the debounce
  /// timer; an append that fills the batch closes it on the spot.
  fn enroll(self: &Arc<Self>, state: &mut LoaderState<K, V, E, H>, batch: &Arc<Batch<K, V, E>>, key: &K) -> usize {
    let mut inner = batch.inner.lock();

    if let Some(pos) = inner.keys.iter().position(|existing| existing == key) {
      return pos;
    }

    let pos = inner.keys.len();
    inner.keys.push(key.clone());

    if pos == 0 {
      let shared = Arc::clone(self);
      let batch = Arc::clone(batch);
      thread::spawn(move || shared.run_timer(batch));
    }

    if self.max_batch != 0 && pos >= self.max_batch - 1 && !inner.closing {
      inner.closing = true;
      // Detach synchronously so the next miss opens a fresh batch.
      state.batch = None;
      self
        .metrics
        .batches_closed_by_size
        .fetch_add(1, Ordering::Relaxed);
      drop(inner);
      self.dispatch(Arc::clone(batch));
    }

    pos
  }

  /// The debounce timer. Runs on its own thread so closure never depends on
  /// any particular caller remaining alive.
  fn run_timer(self: Arc<Self>, batch: Arc<Batch<K, V, E>>) {
    thread::sleep(self.wait);

    let mut state = self.state.lock();
    {
      let mut inner = batch.inner.lock();
      // The size cutoff won the race and owns completion.
      if inner.closing {
        return;
      }
      inner.closing = true;
    }
    state.batch = None;
    self
      .metrics
      .batches_closed_by_timer
      .fetch_add(1, Ordering::Relaxed);
    drop(state);

    self.execute(batch);
  }

  /// Hands a closed batch off for fetching without running a synchronous
  /// fetch on the calling thread. Safe to call while the loader lock is
  /// held: the sync arm only spawns a thread and the async arm only
  /// enqueues a task.
  fn dispatch(self: &Arc<Self>, batch: Arc<Batch<K, V, E>>) {
    match &self.fetcher {
      Fetcher::Sync(_) => {
        let shared = Arc::clone(self);
        thread::spawn(move || shared.execute(batch));
      }
      Fetcher::Async(_) => self.execute(batch),
    }
  }

  /// Invokes the fetch callback with the batch's full key sequence and
  /// completes the batch. Runs without any lock held.
  fn execute(self: &Arc<Self>, batch: Arc<Batch<K, V, E>>) {
    let keys = batch.inner.lock().keys.clone();

    match self.fetcher.clone() {
      Fetcher::Sync(fetch) => {
        let (values, errors) = fetch(&keys);
        self.record_dispatch(keys.len());
        batch.complete(values, errors);
      }
      Fetcher::Async(fetch) => {
        let spawner = self
          .spawner
          .as_ref()
          .expect("spawner must exist for an async fetcher");
        let shared = Arc::clone(self);
        let task = async move {
          let key_count = keys.len();
          let (values, errors) = fetch(keys).await;
          shared.record_dispatch(key_count);
          batch.complete(values, errors);
        };
        spawner.spawn(Box::pin(task));
      }
    }
  }

  fn record_dispatch(&self, key_count: usize) {
    self
      .metrics
      .batches_dispatched
      .fetch_add(1, Ordering::Relaxed);
    self
      .metrics
      .keys_fetched
      .fetch_add(key_count as u64, Ordering::Relaxed);
  }

  /// Inserts a value only if the key is absent; returns whether the
  /// insertion happened.
  pub(crate) fn prime(&self, key: K, value: V) -> bool {
    let mut state = self.state.lock();
    if state.cache.contains_key(&key) {
      return false;
    }
    state.cache.insert(key, Some(Arc::new(value)));
    self.metrics.primes.fetch_add(1, Ordering::Relaxed);
    true
  }

  /// Removes the key from the cache if present; no-op otherwise.
  pub(crate) fn clear(&self, key: &K) {
    let mut state = self.state.lock();
    if state.cache.remove(key).is_some() {
      self.metrics.clears.fetch_add(1, Ordering::Relaxed);
    }
  }
}
