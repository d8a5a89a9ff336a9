#![allow(dead_code)]

use coalesce::{BatchErrors, FetchResult};

use std::sync::{Arc, Mutex};

/// A record of every fetch call a loader made, in dispatch order.
pub type FetchLog = Arc<Mutex<Vec<Vec<i32>>>>;

/// A fetch callback that logs each call and maps key `k` to value `"v{k}"`.
pub fn tracking_fetch() -> (
  FetchLog,
  impl Fn(&[i32]) -> FetchResult<String, String> + Send + Sync + 'static,
) {
  let log: FetchLog = Arc::new(Mutex::new(Vec::new()));
  let calls = log.clone();
  let fetch = move |keys: &[i32]| {
    calls.lock().unwrap().push(keys.to_vec());
    let values = keys.iter().map(|k| Some(format!("v{k}"))).collect();
    (values, BatchErrors::None)
  };
  (log, fetch)
}

/// Total number of fetch calls recorded so far.
pub fn call_count(log: &FetchLog) -> usize {
  log.lock().unwrap().len()
}

/// The union of all keys fetched so far, sorted.
pub fn fetched_keys(log: &FetchLog) -> Vec<i32> {
  let mut keys: Vec<i32> = log.lock().unwrap().iter().flatten().copied().collect();
  keys.sort_unstable();
  keys
}
