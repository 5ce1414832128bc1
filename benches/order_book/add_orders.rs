use chrono::Utc;
use criterion::{BenchmarkId, Criterion};
use lobfeed_rs::orderbook::{LimitOrderBook, Price, Side, Size};
use std::hint::black_box;
use uuid::Uuid;

/// Register benchmarks for order insertion.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("LimitOrderBook - Add");

    // Insert across a spread of price levels: half bids, half asks.
    for &order_count in &[100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("add_orders", order_count),
            &order_count,
            |b, &count| {
                let now = Utc::now();
                b.iter_with_setup(
                    || {
                        let uids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
                        (LimitOrderBook::new("BENCH"), uids)
                    },
                    |(mut book, uids)| {
                        for (i, uid) in uids.into_iter().enumerate() {
                            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                            let price = 1_000 + (i % 500) as u64;
                            book.apply_add(uid, side, Price(price), Size(10), now)
                                .unwrap();
                        }
                        black_box(book)
                    },
                );
            },
        );
    }

    // Hot-spot insertion: every order lands on one price level, so the
    // cost is the FIFO append rather than the tree walk.
    group.bench_function("add_orders_single_level_10000", |b| {
        let now = Utc::now();
        b.iter_with_setup(
            || {
                let uids: Vec<Uuid> = (0..10_000).map(|_| Uuid::new_v4()).collect();
                (LimitOrderBook::new("BENCH"), uids)
            },
            |(mut book, uids)| {
                for uid in uids {
                    book.apply_add(uid, Side::Buy, Price(1_000), Size(10), now)
                        .unwrap();
                }
                black_box(book)
            },
        );
    });

    group.finish();
}
