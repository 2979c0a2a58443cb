//! End-to-end load benchmarks over generated files.
//!
//! Run with: `cargo bench --bench ingest`
//! Save baseline: `cargo bench --bench ingest -- --save-baseline main`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ftv::config::LoadOptions;
use ftv::ingest::{load, spawn_load, Input};
use ftv::table::TableBuffer;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create_fixture(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(format!("rows_{rows}.csv"));

    let mut content = String::from("id,name,city,amount,joined\n");
    for i in 0..rows {
        content.push_str(&format!(
            "{i},\"Person {i}\",City {},{}.{:02},2023-{:02}-{:02}\n",
            i % 50,
            (i * 31) % 100_000,
            i % 100,
            i % 12 + 1,
            i % 28 + 1
        ));
    }
    fs::write(&path, content).expect("Failed to write fixture");

    (temp_dir, path)
}

fn run_sync(path: &Path) -> usize {
    let buffer = TableBuffer::new();
    let input = Input::open(path).expect("Failed to open fixture");
    let options = LoadOptions {
        async_load: false,
        ..LoadOptions::default()
    };
    load(input, &options, &buffer).expect("Load failed");
    buffer.row_count()
}

fn run_async(path: &Path, workers: usize) -> usize {
    let buffer = Arc::new(TableBuffer::new());
    let input = Input::open(path).expect("Failed to open fixture");
    let options = LoadOptions {
        workers,
        ..LoadOptions::default()
    };
    let handle = spawn_load(input, options, Arc::clone(&buffer)).expect("Failed to spawn load");
    handle.wait().expect("Load failed");
    buffer.row_count()
}

fn bench_load(c: &mut Criterion) {
    let (_temp_dir, path) = create_fixture(200_000);
    let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let mut group = c.benchmark_group("load_200k");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(30));
    group.throughput(Throughput::Bytes(bytes));

    group.bench_function("sync", |b| b.iter(|| run_sync(&path)));
    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("async", workers), &workers, |b, &w| {
            b.iter(|| run_async(&path, w))
        });
    }
    group.finish();
}

fn bench_time_to_first_rows(c: &mut Criterion) {
    let (_temp_dir, path) = create_fixture(500_000);

    let mut group = c.benchmark_group("first_rows");
    group.sample_size(10);
    group.bench_function("ready_500k", |b| {
        b.iter(|| {
            let buffer = Arc::new(TableBuffer::new());
            let input = Input::open(&path).expect("Failed to open fixture");
            let handle = spawn_load(input, LoadOptions::default(), Arc::clone(&buffer))
                .expect("Failed to spawn load");
            let ready = handle.wait_ready();
            handle.cancel();
            ready
        })
    });
    group.finish();
}

criterion_group!(benches, bench_load, bench_time_to_first_rows);
criterion_main!(benches);
