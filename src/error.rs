use std::fmt;

/// Errors that can occur when building a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// No fetch callback was configured. A loader cannot do anything without
  /// one; set it with `fetch` or `async_fetch`.
  FetchRequired,
  /// An `async_fetch` callback was provided, but no `TaskSpawner` was
  /// configured and the default `tokio` feature is not enabled.
  SpawnerRequired,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::FetchRequired => write!(f, "a loader requires a fetch or async_fetch callback"),
      BuildError::SpawnerRequired => write!(
        f,
        "an async fetch callback requires a task spawner or the 'tokio' feature"
      ),
    }
  }
}

impl std::error::Error for BuildError {}
