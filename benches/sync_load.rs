use coalesce::{BatchErrors, LoaderBuilder};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::time::Duration;

fn bench_cached_load(c: &mut Criterion) {
  let loader = LoaderBuilder::new()
    .wait(Duration::from_millis(1))
    .fetch(|keys: &[u64]| {
      let values = keys.iter().map(|k| Some(*k * 10)).collect();
      (values, BatchErrors::<String>::None)
    })
    .build()
    .unwrap();

  for key in 0..1024u64 {
    loader.prime(key, key * 10);
  }

  c.bench_function("cached_load", |b| {
    let mut key = 0u64;
    b.iter(|| {
      key = (key + 1) & 1023;
      black_box(loader.load(key).unwrap())
    })
  });
}

fn bench_load_all_one_batch(c: &mut Criterion) {
  c.bench_function("load_all_64_keys_one_batch", |b| {
    b.iter_with_setup(
      || {
        LoaderBuilder::new()
          .wait(Duration::from_micros(100))
          .fetch(|keys: &[u64]| {
            let values = keys.iter().map(|k| Some(*k * 10)).collect();
            (values, BatchErrors::<String>::None)
          })
          .build()
          .unwrap()
      },
      |loader| {
        let keys: Vec<u64> = (0..64).collect();
        black_box(loader.load_all(&keys))
      },
    )
  });
}

criterion_group!(benches, bench_cached_load, bench_load_all_one_batch);
criterion_main!(benches);
