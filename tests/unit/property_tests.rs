//! Property tests: random event streams must preserve every structural
//! invariant, and the aggregate level maps must equal the algebraic sum
//! of per-event effects tracked by a naive model.

use chrono::{TimeZone, Utc};
use lobfeed_rs::orderbook::{LimitOrderBook, Price, Side, Size};
use proptest::prelude::*;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Add { bid: bool, price: u8, size: u8 },
    Cancel { pick: u8 },
    Change { pick: u8, new_size: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<bool>(), 1u8..40, 1u8..50)
            .prop_map(|(bid, price, size)| Op::Add { bid, price, size }),
        2 => any::<u8>().prop_map(|pick| Op::Cancel { pick }),
        2 => (any::<u8>(), 0u8..50)
            .prop_map(|(pick, new_size)| Op::Change { pick, new_size }),
    ]
}

/// Reference model: a flat list of live orders. Everything the book
/// reports must be derivable from this list.
#[derive(Default)]
struct Model {
    live: Vec<(Uuid, Side, u64, u64)>,
}

impl Model {
    fn add(&mut self, uid: Uuid, side: Side, price: u64, size: u64) {
        self.live.push((uid, side, price, size));
    }

    fn cancel(&mut self, uid: Uuid) {
        self.live.retain(|(id, ..)| *id != uid);
    }

    fn change(&mut self, uid: Uuid, new_size: u64) {
        if new_size == 0 {
            self.cancel(uid);
            return;
        }
        for entry in &mut self.live {
            if entry.0 == uid {
                entry.3 = new_size;
            }
        }
    }

    fn levels(&self, side: Side) -> BTreeMap<u64, u64> {
        let mut levels = BTreeMap::new();
        for (_, s, price, size) in &self.live {
            if *s == side {
                *levels.entry(*price).or_insert(0) += size;
            }
        }
        levels
    }
}

fn assert_book_matches_model(book: &LimitOrderBook, model: &Model) {
    book.validate().unwrap();
    assert_eq!(book.order_count(), model.live.len());

    let depth = book.aggregated_levels(None);
    let bids: BTreeMap<u64, u64> = depth
        .bids
        .iter()
        .map(|(p, s)| (p.ticks(), s.lots()))
        .collect();
    let asks: BTreeMap<u64, u64> = depth
        .asks
        .iter()
        .map(|(p, s)| (p.ticks(), s.lots()))
        .collect();
    assert_eq!(bids, model.levels(Side::Buy));
    assert_eq!(asks, model.levels(Side::Sell));

    // Depth vectors are price-priority ordered.
    assert!(depth.bids.windows(2).all(|w| w[0].0 > w[1].0));
    assert!(depth.asks.windows(2).all(|w| w[0].0 < w[1].0));

    // Best prices come from the same projection.
    assert_eq!(
        book.best_bid().map(|p| p.ticks()),
        model.levels(Side::Buy).keys().next_back().copied()
    );
    assert_eq!(
        book.best_ask().map(|p| p.ticks()),
        model.levels(Side::Sell).keys().next().copied()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn random_streams_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..250)) {
        let mut book = LimitOrderBook::new("BTC-USD");
        let mut model = Model::default();
        let mut known_uids: Vec<Uuid> = Vec::new();
        let timestamp = Utc.with_ymd_and_hms(2022, 9, 15, 12, 0, 0).unwrap();

        for op in ops {
            match op {
                Op::Add { bid, price, size } => {
                    let uid = Uuid::new_v4();
                    let side = if bid { Side::Buy } else { Side::Sell };
                    book.apply_add(uid, side, Price(price as u64), Size(size as u64), timestamp)
                        .unwrap();
                    model.add(uid, side, price as u64, size as u64);
                    known_uids.push(uid);
                }
                Op::Cancel { pick } => {
                    if known_uids.is_empty() {
                        continue;
                    }
                    let uid = known_uids[pick as usize % known_uids.len()];
                    let removed = book.apply_cancel(uid, timestamp);
                    // Second cancel of the same uid is a tolerated no-op.
                    prop_assert_eq!(
                        removed.is_some(),
                        model.live.iter().any(|(id, ..)| *id == uid)
                    );
                    model.cancel(uid);
                }
                Op::Change { pick, new_size } => {
                    if known_uids.is_empty() {
                        continue;
                    }
                    let uid = known_uids[pick as usize % known_uids.len()];
                    book.apply_change(uid, Size(new_size as u64), timestamp);
                    model.change(uid, new_size as u64);
                }
            }
            assert_book_matches_model(&book, &model);
        }
    }

    #[test]
    fn pure_insert_streams_stay_balanced(prices in proptest::collection::vec(1u64..10_000, 1..500)) {
        let mut book = LimitOrderBook::new("BTC-USD");
        for price in &prices {
            book.apply_add(Uuid::new_v4(), Side::Sell, Price(*price), Size(1),
                Utc.with_ymd_and_hms(2022, 9, 15, 12, 0, 0).unwrap())
                .unwrap();
        }
        book.validate().unwrap();

        let levels = book.asks().len() as f64;
        let bound = (1.44 * (levels + 2.0).log2()).ceil() as u32;
        prop_assert!(book.asks().height() <= bound,
            "height {} exceeds AVL bound {bound} for {levels} levels",
            book.asks().height());

        // In-order traversal yields strictly increasing prices.
        let walked: Vec<u64> = book.asks().iter_ascending().map(|l| l.price.ticks()).collect();
        let mut expected: Vec<u64> = prices.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(walked, expected);
    }
}
