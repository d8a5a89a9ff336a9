mod common;

use coalesce::LoaderBuilder;
use common::{call_count, fetched_keys, tracking_fetch};

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn load_fetches_then_serves_from_cache() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  let value = loader.load(1).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("v1"));
  assert_eq!(call_count(&log), 1);

  // Second load of the same key must not fetch again.
  let value = loader.load(1).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("v1"));
  assert_eq!(call_count(&log), 1, "cached key was fetched again");

  let metrics = loader.metrics();
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 1);
}

#[test]
fn concurrent_loads_coalesce_into_one_fetch() {
  let (log, fetch) = tracking_fetch();
  let loader = Arc::new(
    LoaderBuilder::new()
      .wait(Duration::from_millis(50))
      .fetch(fetch)
      .build()
      .unwrap(),
  );

  let barrier = Arc::new(Barrier::new(3));
  let mut handles = vec![];
  for key in [1, 2, 3] {
    let loader = loader.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      let value = loader.load(key).unwrap();
      assert_eq!(value.as_deref().map(String::as_str), Some(format!("v{key}").as_str()));
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  // All three keys landed inside one debounce window, so there must be
  // exactly one fetch call carrying their union.
  assert_eq!(call_count(&log), 1);
  assert_eq!(fetched_keys(&log), vec![1, 2, 3]);
  assert_eq!(loader.metrics().batches_closed_by_timer, 1);
}

#[test]
fn load_all_preserves_input_order_and_dedups() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  let results = loader.load_all(&[3, 1, 3, 2]);
  let values: Vec<_> = results
    .into_iter()
    .map(|r| r.unwrap().unwrap().to_string())
    .collect();
  assert_eq!(values, ["v3", "v1", "v3", "v2"]);

  // The duplicate 3 reuses its batch position instead of being sent twice.
  assert_eq!(call_count(&log), 1);
  assert_eq!(log.lock().unwrap()[0], vec![3, 1, 2]);
}

#[test]
fn load_thunk_does_not_block_until_consumed() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  let thunk_a = loader.load_thunk(10);
  let thunk_b = loader.load_thunk(11);
  // Nothing has been fetched yet; both keys sit in the open batch.
  assert_eq!(call_count(&log), 0);

  assert_eq!(
    thunk_a.wait().unwrap().as_deref().map(String::as_str),
    Some("v10")
  );
  assert_eq!(
    thunk_b.wait().unwrap().as_deref().map(String::as_str),
    Some("v11")
  );
  assert_eq!(call_count(&log), 1);
  assert_eq!(log.lock().unwrap()[0], vec![10, 11]);
}

#[test]
fn an_abandoned_thunk_still_lets_the_fetch_happen() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  // Enqueue a key and walk away without consuming the thunk. There is no
  // cancellation: the batch still closes and fetches it.
  drop(loader.load_thunk(21));

  thread::sleep(Duration::from_millis(50));
  assert_eq!(call_count(&log), 1);
  assert_eq!(log.lock().unwrap()[0], vec![21]);
}

#[test]
fn a_spurious_wakeup_does_not_disturb_a_waiting_thread() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(50))
    .fetch(fetch)
    .build()
    .unwrap();

  let thunk = loader.load_thunk(30);
  let handle = thread::spawn(move || thunk.wait());

  // Poke the waiting thread before the batch completes; it must re-check,
  // keep waiting, and still come back with the right value.
  thread::sleep(Duration::from_millis(10));
  handle.thread().unpark();

  let value = handle.join().unwrap().unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("v30"));
  assert_eq!(call_count(&log), 1);
}

#[test]
fn a_thunk_can_be_awaited_outside_a_tokio_runtime() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  // The thunk is a plain Future; any executor can drive it while the
  // timer thread completes the batch.
  let value = futures_executor::block_on(loader.load_thunk(40)).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("v40"));
  assert_eq!(call_count(&log), 1);
}

#[test]
fn separate_windows_produce_separate_batches() {
  let (log, fetch) = tracking_fetch();
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(5))
    .fetch(fetch)
    .build()
    .unwrap();

  loader.load(1).unwrap();
  loader.load(2).unwrap();

  let calls = log.lock().unwrap().clone();
  assert_eq!(calls, vec![vec![1], vec![2]]);
}
