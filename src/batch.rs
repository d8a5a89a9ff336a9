use crate::fetcher::BatchErrors;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::Waker;
use std::thread::Thread;

/// A caller waiting on a batch's completion signal.
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// The errors of a completed batch, shared among all of its waiters.
pub(crate) enum StoredErrors<E> {
  None,
  Shared(Arc<E>),
  PerKey(Vec<Option<Arc<E>>>),
}

impl<E> StoredErrors<E> {
  fn from_fetch(errors: BatchErrors<E>) -> Self {
    match errors {
      BatchErrors::None => StoredErrors::None,
      BatchErrors::Shared(e) => StoredErrors::Shared(Arc::new(e)),
      BatchErrors::PerKey(errs) => {
        StoredErrors::PerKey(errs.into_iter().map(|e| e.map(Arc::new)).collect())
      }
    }
  }

  /// Resolves the error for the key at `pos`. A per-key vector shorter than
  /// the key list yields "no error" rather than a fault.
  pub(crate) fn for_pos(&self, pos: usize) -> Option<Arc<E>> {
    match self {
      StoredErrors::None => None,
      StoredErrors::Shared(e) => Some(e.clone()),
      StoredErrors::PerKey(errs) => errs.get(pos).and_then(|e| e.clone()),
    }
  }
}

/// The completion state of a batch. Transitions from `Pending` to `Done`
/// exactly once; every waiter, whether it subscribed before or after the
/// transition, observes the same result.
pub(crate) enum BatchState<V, E> {
  Pending,
  Done {
    values: Vec<Option<Arc<V>>>,
    errors: StoredErrors<E>,
  },
}

pub(crate) struct BatchInner<K, V, E> {
  /// Ordered, append-only, de-duplicated. Mutated only while the loader
  /// lock is also held.
  pub(crate) keys: Vec<K>,
  /// Set exactly once, under the loader lock, by whichever of the timer
  /// path and the size-cutoff path wins; the loser exits without side
  /// effects.
  pub(crate) closing: bool,
  pub(crate) state: BatchState<V, E>,
  pub(crate) waiters: VecDeque<Waiter>,
}

/// One in-flight accumulation window: the keys collected so far and the
/// completion signal their thunks block on. It can be awaited by multiple
/// sync threads and async tasks simultaneously.
pub(crate) struct Batch<K, V, E> {
  pub(crate) inner: Mutex<BatchInner<K, V, E>>,
}

impl<K, V, E> Batch<K, V, E> {
  /// Creates a new, empty batch in the "Pending" state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(BatchInner {
        keys: Vec::new(),
        closing: false,
        state: BatchState::Pending,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Stores the fetch results and wakes all waiters. Runs at most once per
  /// batch, guaranteed by the `closing` gate upstream.
  pub(crate) fn complete(&self, values: Vec<Option<V>>, errors: BatchErrors<E>) {
    let values = values.into_iter().map(|v| v.map(Arc::new)).collect();
    let errors = StoredErrors::from_fetch(errors);

    let mut inner = self.inner.lock();
    inner.state = BatchState::Done { values, errors };
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }
}
