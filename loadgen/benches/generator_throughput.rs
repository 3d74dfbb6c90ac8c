//! Micro-benchmarks for the load generator against the in-process ping host
//!
//! - Sequential dispatch (single worker) at several block sizes
//! - Concurrent dispatch across worker counts with a fixed total
//!
//! Run with: cargo bench --bench generator_throughput

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ping_loadgen::generator::RunConfiguration;
use ping_loadgen::ping::PingSource;
use ping_loadgen::{ConcurrentLoadGenerator, HostConfig, PingHost};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn bench_sequential(c: &mut Criterion) {
    let rt = runtime();
    let host = PingHost::start(HostConfig::default());
    let mut group = c.benchmark_group("sequential_ping");

    for requests in [1_000, 10_000, 50_000] {
        let config = RunConfiguration::new(1, 1, requests).unwrap();
        let generator = ConcurrentLoadGenerator::new(config, PingSource::new(host.clone()));
        group.throughput(Throughput::Elements(requests as u64));

        group.bench_with_input(
            BenchmarkId::new("requests_per_block", requests),
            &generator,
            |b, generator| b.iter(|| rt.block_on(generator.run()).unwrap()),
        );
    }

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let rt = runtime();
    let host = PingHost::start(HostConfig::default());
    let mut group = c.benchmark_group("concurrent_ping");
    group.sample_size(20);

    // Fixed 100K requests, spread over more workers each step
    let total = 100_000;
    for workers in [1, 10, 50, 250] {
        let blocks = 4;
        let config = RunConfiguration::new(workers, blocks, total / (workers * blocks)).unwrap();
        let generator = ConcurrentLoadGenerator::new(config, PingSource::new(host.clone()));
        group.throughput(Throughput::Elements(generator.config().total_requests()));

        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &generator,
            |b, generator| b.iter(|| rt.block_on(generator.run()).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_concurrent);
criterion_main!(benches);
