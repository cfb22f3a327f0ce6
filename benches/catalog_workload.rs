use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rcu_catalog::{Catalog, ReclaimPolicy};

/// Benchmark: Insert throughput at varying catalog sizes
///
/// Appending walks to the tail under the writer lock, so cost grows with
/// the number of published records.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [16u64, 128, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("records", size), size, |b, &size| {
            b.iter(|| {
                let catalog = Catalog::new();
                for id in 0..size {
                    catalog.insert(id, "book", "author").unwrap();
                }
                black_box(&catalog);
            });
        });
    }

    group.finish();
}

/// Benchmark: Copy-on-write update under both reclamation policies
///
/// The synchronous policy pays a grace-period wait per call; the deferred
/// policy batches finalization into reap cycles.
fn bench_update_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    group.bench_function("synchronous", |b| {
        let catalog = Catalog::new();
        catalog.insert(0, "book", "author").unwrap();

        let mut borrowed = false;
        b.iter(|| {
            catalog.update(0, borrowed, ReclaimPolicy::Synchronous).unwrap();
            borrowed = !borrowed;
        });
    });

    group.bench_function("deferred", |b| {
        let catalog = Catalog::new();
        catalog.insert(0, "book", "author").unwrap();

        let mut borrowed = false;
        b.iter(|| {
            catalog.update(0, borrowed, ReclaimPolicy::Deferred).unwrap();
            borrowed = !borrowed;
        });
    });

    group.finish();
}

/// Benchmark: Lookup hit and miss costs
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let catalog = Catalog::new();
    for id in 0..64u64 {
        catalog.insert(id, "book", "author").unwrap();
    }
    let reader = catalog.reader();

    group.bench_function("hit", |b| {
        b.iter(|| {
            let view = reader.lookup(black_box(32)).unwrap();
            black_box(view);
        });
    });

    group.bench_function("miss", |b| {
        b.iter(|| {
            let view = reader.lookup(black_box(1000));
            black_box(view);
        });
    });

    group.finish();
}

/// Benchmark: Delete + reinsert cycle under both policies
fn bench_delete_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_reinsert");

    group.bench_function("synchronous", |b| {
        let catalog = Catalog::new();

        b.iter(|| {
            catalog.insert(0, "book", "author").unwrap();
            catalog.delete(0, ReclaimPolicy::Synchronous).unwrap();
        });
    });

    group.bench_function("deferred", |b| {
        let catalog = Catalog::new();

        b.iter(|| {
            catalog.insert(0, "book", "author").unwrap();
            catalog.delete(0, ReclaimPolicy::Deferred).unwrap();
        });
    });

    group.finish();
}

/// Benchmark: Explicit reap cycles over growing defer queues
fn bench_reap(c: &mut Criterion) {
    let mut group = c.benchmark_group("reap");

    for pending in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("pending", pending),
            pending,
            |b, &pending| {
                b.iter(|| {
                    let catalog = Catalog::builder().reap_threshold(None).build();
                    catalog.insert(0, "book", "author").unwrap();

                    let mut borrowed = false;
                    for _ in 0..pending {
                        catalog.update(0, borrowed, ReclaimPolicy::Deferred).unwrap();
                        borrowed = !borrowed;
                    }

                    catalog.reap();
                    black_box(&catalog);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_update_policies,
    bench_lookup,
    bench_delete_policies,
    bench_reap
);
criterion_main!(benches);
