//! Criterion benchmarks for the distributed counting sort.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hybrid_count_sort::sorter::{self, SortConfig};

/// Benchmark the full distributed pipeline (host-only counting) across sizes.
fn bench_count_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("Distributed Count Sort");

    for size_exp in [12, 14, 16, 18, 20] {
        let size = 1usize << size_exp;
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let config = SortConfig {
                size,
                workers: 4,
                device_pct: 0,
            };
            b.iter(|| sorter::run(black_box(&config), None).unwrap());
        });
    }

    group.finish();
}

/// Baseline: pdqsort on the same synthetic input.
fn bench_cpu_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("CPU Sort (std unstable / pdqsort)");

    for size_exp in [12, 14, 16, 18, 20] {
        let size = 1usize << size_exp;
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || sorter::generate_input(size),
                |mut data| {
                    data.sort_unstable();
                    data
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_count_sort, bench_cpu_baseline);
criterion_main!(benches);
