use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the loader.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Administrative API ---
  pub(crate) primes: CachePadded<AtomicU64>,
  pub(crate) clears: CachePadded<AtomicU64>,

  // --- Batch lifecycle ---
  pub(crate) batches_dispatched: CachePadded<AtomicU64>,
  pub(crate) batches_closed_by_size: CachePadded<AtomicU64>,
  pub(crate) batches_closed_by_timer: CachePadded<AtomicU64>,
  pub(crate) keys_fetched: CachePadded<AtomicU64>,

  // --- Timestamps for Uptime ---
  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      primes: CachePadded::new(AtomicU64::new(0)),
      clears: CachePadded::new(AtomicU64::new(0)),
      batches_dispatched: CachePadded::new(AtomicU64::new(0)),
      batches_closed_by_size: CachePadded::new(AtomicU64::new(0)),
      batches_closed_by_timer: CachePadded::new(AtomicU64::new(0)),
      keys_fetched: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      primes: self.primes.load(Ordering::Relaxed),
      clears: self.clears.load(Ordering::Relaxed),
      batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
      batches_closed_by_size: self.batches_closed_by_size.load(Ordering::Relaxed),
      batches_closed_by_timer: self.batches_closed_by_timer.load(Ordering::Relaxed),
      keys_fetched: self.keys_fetched.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a loader's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// The number of lookups answered from the cache.
  pub hits: u64,
  /// The number of lookups that enrolled a key in a batch.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The number of values inserted via `prime`.
  pub primes: u64,
  /// The number of keys removed via `clear`.
  pub clears: u64,
  /// The number of fetch calls made.
  pub batches_dispatched: u64,
  /// Batches closed by reaching the maximum batch size.
  pub batches_closed_by_size: u64,
  /// Batches closed by the debounce timer.
  pub batches_closed_by_timer: u64,
  /// The cumulative number of keys passed to fetch calls.
  pub keys_fetched: u64,
  /// The number of seconds the loader has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("primes", &self.primes)
      .field("clears", &self.clears)
      .field("batches_dispatched", &self.batches_dispatched)
      .field("batches_closed_by_size", &self.batches_closed_by_size)
      .field("batches_closed_by_timer", &self.batches_closed_by_timer)
      .field("keys_fetched", &self.keys_fetched)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
