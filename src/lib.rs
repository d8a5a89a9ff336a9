//! A request-batching, single-flight, per-key caching loader.
//!
//! Many concurrent point lookups for individual keys are collapsed into few
//! bulk fetch calls against a backing data source — the classic mitigation
//! for fan-out ("N+1") query patterns in graph-shaped read paths.
//!
//! # How it works
//! A miss enrolls the key in the currently open batch (opening one if none
//! exists) and hands the caller a deferred [`Thunk`]. The batch closes when
//! its debounce window elapses or when it reaches the configured maximum
//! size, whichever comes first. The fetch callback then runs exactly once
//! with every accumulated key, and the results fan back out to all waiting
//! callers by position. Successful results land in a per-key cache so the
//! same loader never fetches a key twice.
//!
//! # Features
//! - **Sync & Async**: Blocking [`Loader`] and non-blocking [`AsyncLoader`]
//!   handles share one core; a thunk can be `wait()`ed or `.await`ed.
//! - **Non-Clone Support**: Values and errors travel as `Arc`s, so neither
//!   `V: Clone` nor `E: Clone` is required.
//! - **Pluggable fetch**: The backing source is just a callback from ordered
//!   keys to ordered values and errors; the loader owns no I/O.
//! - **Observability**: Counters for hits, misses, and batch dispatch are
//!   exposed via [`MetricsSnapshot`].

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod fetcher;
pub mod handles;
pub mod metrics;
pub mod runtime;

// Internal, crate-only modules
mod batch;
mod shared;
mod thunk;

// Re-export the primary user-facing types for convenience
pub use builder::LoaderBuilder;
pub use error::BuildError;
pub use fetcher::{BatchErrors, FetchResult};
pub use handles::{AsyncLoader, Loader};
pub use metrics::MetricsSnapshot;
pub use runtime::TaskSpawner;
pub use thunk::{LoadResult, Thunk};
