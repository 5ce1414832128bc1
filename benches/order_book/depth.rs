use chrono::Utc;
use criterion::{BenchmarkId, Criterion};
use lobfeed_rs::orderbook::{LimitOrderBook, Price, Side, Size};
use std::hint::black_box;
use uuid::Uuid;

/// Register benchmarks for aggregated depth snapshots, the per-event
/// cost of output emission.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("LimitOrderBook - Depth");

    for &level_count in &[10, 100, 1_000] {
        let now = Utc::now();
        let mut book = LimitOrderBook::new("BENCH");
        for i in 0..level_count {
            book.apply_add(
                Uuid::new_v4(),
                Side::Buy,
                Price(10_000 - i as u64),
                Size(10),
                now,
            )
            .unwrap();
            book.apply_add(
                Uuid::new_v4(),
                Side::Sell,
                Price(10_001 + i as u64),
                Size(10),
                now,
            )
            .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("aggregated_levels_full", level_count),
            &level_count,
            |b, _| {
                b.iter(|| black_box(book.aggregated_levels(None)));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("aggregated_levels_top25", level_count),
            &level_count,
            |b, _| {
                b.iter(|| black_box(book.aggregated_levels(Some(25))));
            },
        );
    }

    group.finish();
}
