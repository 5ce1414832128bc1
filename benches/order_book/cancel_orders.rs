use chrono::Utc;
use criterion::{BenchmarkId, Criterion};
use lobfeed_rs::orderbook::{LimitOrderBook, Price, Side, Size};
use std::hint::black_box;
use uuid::Uuid;

fn populated_book(count: usize) -> (LimitOrderBook, Vec<Uuid>) {
    let now = Utc::now();
    let mut book = LimitOrderBook::new("BENCH");
    let mut uids = Vec::with_capacity(count);
    for i in 0..count {
        let uid = Uuid::new_v4();
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = 1_000 + (i % 500) as u64;
        book.apply_add(uid, side, Price(price), Size(10), now).unwrap();
        uids.push(uid);
    }
    (book, uids)
}

/// Register benchmarks for cancellation by order id.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("LimitOrderBook - Cancel");

    for &order_count in &[100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("cancel_all_by_id", order_count),
            &order_count,
            |b, &count| {
                let now = Utc::now();
                b.iter_with_setup(
                    || populated_book(count),
                    |(mut book, uids)| {
                        for uid in uids {
                            black_box(book.apply_cancel(uid, now));
                        }
                        assert!(book.is_empty());
                    },
                );
            },
        );
    }

    group.bench_function("change_then_cancel_1000", |b| {
        let now = Utc::now();
        b.iter_with_setup(
            || populated_book(1_000),
            |(mut book, uids)| {
                for uid in &uids {
                    black_box(book.apply_change(*uid, Size(5), now));
                }
                for uid in uids {
                    black_box(book.apply_cancel(uid, now));
                }
            },
        );
    });

    group.finish();
}
