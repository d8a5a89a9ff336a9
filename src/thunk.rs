use crate::batch::{Batch, BatchState, Waiter};
use crate::shared::LoaderShared;

use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

/// The outcome of loading one key.
///
/// - `Ok(Some(v))` — a fetched or cached value.
/// - `Ok(None)` — the key resolved without error but carried no value. This
///   is a successful result and is cached like any other.
/// - `Err(e)` — the fetch reported an error for this key (shared or
///   per-key). Errored keys are never cached, so a later load retries.
pub type LoadResult<V, E> = Result<Option<Arc<V>>, Arc<E>>;

enum ThunkState<K, V, E, H> {
  /// Already resolved: a cache hit, or a batch result that has been read.
  Ready(LoadResult<V, E>),
  /// Bound to a batch at a fixed position in its key sequence.
  Bound {
    shared: Arc<LoaderShared<K, V, E, H>>,
    batch: Arc<Batch<K, V, E>>,
    key: K,
    pos: usize,
  },
}

/// A deferred load. Obtained from `load_thunk`; consume it by calling
/// [`wait`](Thunk::wait) (blocking) or by `.await`ing it.
///
/// Resolution blocks only on the bound batch's completion signal, never on
/// the loader lock. On the no-error path the resolved value is written into
/// the loader's cache, lazily, the first time the thunk is consumed.
#[must_use = "a thunk does nothing until waited on or awaited"]
pub struct Thunk<K, V, E, H = ahash::RandomState> {
  state: ThunkState<K, V, E, H>,
}

impl<K, V, E, H> Unpin for Thunk<K, V, E, H> {}

impl<K, V, E, H> Thunk<K, V, E, H> {
  pub(crate) fn ready(result: LoadResult<V, E>) -> Self {
    Self {
      state: ThunkState::Ready(result),
    }
  }

  pub(crate) fn bound(
    shared: Arc<LoaderShared<K, V, E, H>>,
    batch: Arc<Batch<K, V, E>>,
    key: K,
    pos: usize,
  ) -> Self {
    Self {
      state: ThunkState::Bound {
        shared,
        batch,
        key,
        pos,
      },
    }
  }
}

impl<K, V, E, H> Thunk<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Blocks the calling thread until the bound batch completes, then
  /// resolves this key's value and error by position.
  pub fn wait(self) -> LoadResult<V, E> {
    match self.state {
      ThunkState::Ready(result) => result,
      ThunkState::Bound {
        shared,
        batch,
        key,
        pos,
      } => {
        let mut inner = batch.inner.lock();
        loop {
          match &inner.state {
            BatchState::Done { values, errors } => {
              let value = values.get(pos).cloned().flatten();
              let err = errors.for_pos(pos);
              drop(inner);
              return resolve(&shared, key, value, err);
            }
            BatchState::Pending => {
              // Add our thread to the waiter list and go to sleep. A spurious
              // wakeup re-enters here; skip the push if our entry is still
              // queued so waiters do not accumulate duplicates.
              let current = thread::current();
              let already = inner
                .waiters
                .iter()
                .any(|w| matches!(w, Waiter::Sync(t) if t.id() == current.id()));
              if !already {
                inner.waiters.push_back(Waiter::Sync(current));
              }
              drop(inner); // IMPORTANT: Unlock before parking.
              thread::park();
              inner = batch.inner.lock(); // Re-acquire lock after being woken up.
            }
          }
        }
      }
    }
  }
}

impl<K, V, E, H> Future for Thunk<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  type Output = LoadResult<V, E>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match &mut this.state {
      ThunkState::Ready(result) => Poll::Ready(result.clone()),
      ThunkState::Bound {
        shared,
        batch,
        key,
        pos,
      } => {
        let mut inner = batch.inner.lock();
        match &inner.state {
          BatchState::Done { values, errors } => {
            let value = values.get(*pos).cloned().flatten();
            let err = errors.for_pos(*pos);
            drop(inner);
            let result = resolve(shared, key.clone(), value, err);
            this.state = ThunkState::Ready(result.clone());
            Poll::Ready(result)
          }
          BatchState::Pending => {
            // Register our waker unless an earlier poll already did.
            let already = inner
              .waiters
              .iter()
              .any(|w| matches!(w, Waiter::Async(waker) if waker.will_wake(cx.waker())));
            if !already {
              inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
            }
            Poll::Pending
          }
        }
      }
    }
  }
}

/// Applies the resolved (value, error) pair: errors propagate verbatim, and
/// only the no-error path writes the key into the cache. This is the sole
/// place cache entries are created by fetching.
fn resolve<K, V, E, H>(
  shared: &Arc<LoaderShared<K, V, E, H>>,
  key: K,
  value: Option<Arc<V>>,
  err: Option<Arc<E>>,
) -> LoadResult<V, E>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  match err {
    Some(e) => Err(e),
    None => {
      let mut state = shared.state.lock();
      state.cache.insert(key, value.clone());
      drop(state);
      Ok(value)
    }
  }
}
