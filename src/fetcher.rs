use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The error portion of a fetch result.
///
/// The convention is three-way on purpose. Returning a single [`Shared`]
/// error is a convenient shortcut when the whole bulk call failed (a dead
/// connection, a bad query); [`PerKey`] reports failures positionally when
/// only some keys are at fault. Callers of the loader see exactly the error
/// that applies to their key, and nothing is retried or suppressed on their
/// behalf.
///
/// [`Shared`]: BatchErrors::Shared
/// [`PerKey`]: BatchErrors::PerKey
pub enum BatchErrors<E> {
  /// Every key in the batch succeeded.
  None,
  /// One error that applies to every key in the batch.
  Shared(E),
  /// Errors aligned positionally with the requested keys. A vector shorter
  /// than the key list means "no error" for the missing tail.
  PerKey(Vec<Option<E>>),
}

/// What a fetch callback returns: values aligned positionally with the
/// requested keys, plus the batch's errors.
///
/// `None` at a position means "no value" for that key, which the loader
/// treats as a successful result (and caches). A value vector shorter than
/// the key list degrades to `None` for the missing tail rather than faulting.
pub type FetchResult<V, E> = (Vec<Option<V>>, BatchErrors<E>);

pub(crate) type SyncFetchFn<K, V, E> = dyn Fn(&[K]) -> FetchResult<V, E> + Send + Sync;
pub(crate) type AsyncFetchFn<K, V, E> =
  dyn Fn(Vec<K>) -> Pin<Box<dyn Future<Output = FetchResult<V, E>> + Send>> + Send + Sync;

/// An enum that holds either a synchronous or an asynchronous fetch callback.
///
/// This is stored in the `LoaderBuilder` and `LoaderShared` to define how a
/// closed batch obtains its data. We use trait objects to store the closure,
/// which can have an unknown size.
pub(crate) enum Fetcher<K, V, E> {
  Sync(Arc<SyncFetchFn<K, V, E>>),
  Async(Arc<AsyncFetchFn<K, V, E>>),
}

impl<K, V, E> Clone for Fetcher<K, V, E> {
  fn clone(&self) -> Self {
    match self {
      Fetcher::Sync(f) => Fetcher::Sync(f.clone()),
      Fetcher::Async(f) => Fetcher::Async(f.clone()),
    }
  }
}
