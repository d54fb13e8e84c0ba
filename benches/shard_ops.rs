use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shard_store::{ShardStoreConfig, ShardedStore, SyncMode};
use std::hint::black_box;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn open_async(dir: &Path, shards: u32) -> ShardedStore {
    let config = ShardStoreConfig::new(dir, shards).with_sync_mode(SyncMode::Async);
    ShardedStore::open(config).unwrap()
}

fn bench_basic_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_operations");
    group.measurement_time(Duration::from_secs(10));

    for size in [100i64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("insert", size), size, |b, &size| {
            let temp_dir = tempdir().unwrap();
            let store = open_async(temp_dir.path(), 3);

            b.iter(|| {
                for key in 0..size {
                    store.insert(black_box(key), black_box("value")).unwrap();
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("get", size), size, |b, &size| {
            let temp_dir = tempdir().unwrap();
            let store = open_async(temp_dir.path(), 3);
            for key in 0..size {
                store.insert(key, "value").unwrap();
            }

            b.iter(|| {
                for key in 0..size {
                    let _value = store.get(black_box(key)).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_scan_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_all");

    for shards in [1u32, 3, 8].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(shards), shards, |b, &shards| {
            let temp_dir = tempdir().unwrap();
            let store = open_async(temp_dir.path(), shards);
            for key in 0..10_000 {
                store.insert(key, "value").unwrap();
            }

            b.iter(|| black_box(store.scan_all().unwrap()));
        });
    }

    group.finish();
}

fn bench_sync_insert(c: &mut Criterion) {
    c.bench_function("insert_fsync", |b| {
        let temp_dir = tempdir().unwrap();
        let store = ShardedStore::open_at(temp_dir.path(), 3).unwrap();
        let mut key = 0i64;

        b.iter(|| {
            store.insert(black_box(key), "value").unwrap();
            key += 1;
        });
    });
}

criterion_group!(benches, bench_basic_operations, bench_scan_all, bench_sync_insert);
criterion_main!(benches);
