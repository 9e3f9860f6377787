use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::prelude::*;

use workpool::{CallerRunsPolicy, PoolConfig, WorkPool};

const TASKS: usize = 200;

/// Mixed per-task workload sizes, in spin iterations.
fn workloads() -> Vec<u64> {
    let mut rng = thread_rng();
    (0..TASKS).map(|_| rng.gen_range(100..10_000)).collect()
}

fn spin(iterations: u64) -> u64 {
    let mut acc = 0u64;
    for i in 0..iterations {
        acc = acc.wrapping_add(i.wrapping_mul(i));
    }
    acc
}

fn pool(queue_capacity: usize) -> WorkPool {
    WorkPool::builder(PoolConfig::new(
        2,
        4,
        Duration::from_secs(5),
        queue_capacity,
        1,
    ))
    // Caller-runs so saturated bursts still complete instead of
    // dropping work mid-measurement.
    .rejection_policy(CallerRunsPolicy)
    .build()
    .unwrap()
}

fn run_batch(pool: &WorkPool, costs: Vec<u64>) {
    let futures: Vec<_> = costs
        .into_iter()
        .map(|cost| pool.submit(move || spin(cost)))
        .collect();
    for future in futures {
        black_box(future.wait().unwrap());
    }
}

fn run_rayon_batch(pool: &rayon::ThreadPool, costs: Vec<u64>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    for cost in costs {
        let tx = tx.clone();
        pool.spawn(move || {
            tx.send(spin(cost)).unwrap();
        });
    }
    for _ in 0..TASKS {
        black_box(rx.recv().unwrap());
    }
}

fn throughput_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    group.bench_function("workpool", |b| {
        b.iter_batched(
            || (pool(64), workloads()),
            |(pool, costs)| run_batch(&pool, costs),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("rayon", |b| {
        b.iter_batched(
            || {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(4)
                    .build()
                    .unwrap();
                (pool, workloads())
            },
            |(pool, costs)| run_rayon_batch(&pool, costs),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn saturated_burst_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("saturated_burst");

    // Queues of 2 force constant growth and rejection handling.
    group.bench_function("workpool", |b| {
        b.iter_batched(
            || (pool(2), workloads()),
            |(pool, costs)| run_batch(&pool, costs),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("rayon", |b| {
        b.iter_batched(
            || {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(4)
                    .build()
                    .unwrap();
                (pool, workloads())
            },
            |(pool, costs)| run_rayon_batch(&pool, costs),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, throughput_bench, saturated_burst_bench);
criterion_main!(benches);
