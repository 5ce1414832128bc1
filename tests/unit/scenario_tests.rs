//! End-to-end scenarios for the book and the ingest worker, driven
//! through the public API.

use chrono::{DateTime, TimeZone, Utc};
use crossbeam::channel::unbounded;
use lobfeed_rs::feed::FeedMessage;
use lobfeed_rs::ingest::{BuilderConfig, OrderbookBuilder};
use lobfeed_rs::orderbook::{LimitOrderBook, Price, Side, Size};
use uuid::Uuid;

fn ts(seconds: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 9, 15, 12, 0, seconds).unwrap()
}

fn open_msg(uid: Uuid, side: Side, price: &str, size: &str, seq: u64) -> FeedMessage {
    FeedMessage::Open {
        sequence: Some(seq),
        order_id: Some(uid),
        side: Some(side),
        price: Some(price.to_string()),
        remaining_size: Some(size.to_string()),
        time: Some(ts(seq as u32 % 60)),
        product_id: Some("BTC-USD".to_string()),
    }
}

fn config() -> BuilderConfig {
    BuilderConfig {
        output_folder: std::env::temp_dir().join("lobfeed-scenario-tests"),
        ..BuilderConfig::default()
    }
}

/// Empty book to a single level: one open populates one bid level, the
/// tree holds one balanced node, and depth reflects it.
#[test]
fn empty_book_to_single_level() {
    let mut book = LimitOrderBook::new("BTC-USD");
    book.apply_add(Uuid::new_v4(), Side::Buy, Price(100), Size(1), ts(0))
        .unwrap();

    let depth = book.aggregated_levels(None);
    assert_eq!(depth.bids, vec![(Price(100), Size(1))]);
    assert!(depth.asks.is_empty());
    assert_eq!(book.best_bid(), Some(Price(100)));
    assert_eq!(book.bids().len(), 1);
    assert_eq!(book.bids().height(), 1);
    book.validate().unwrap();
}

/// FIFO within a level: two orders at one price keep arrival order, and
/// cancelling the first leaves the second at the head.
#[test]
fn fifo_within_level() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut book = LimitOrderBook::new("BTC-USD");
    book.apply_add(a, Side::Buy, Price(100), Size(1), ts(1)).unwrap();
    book.apply_add(b, Side::Buy, Price(100), Size(2), ts(2)).unwrap();

    let level = book.bids().level(Price(100)).unwrap();
    assert_eq!(level.total_size, Size(3));
    assert_eq!(level.order_count, 2);
    assert_eq!(book.queue_at(Side::Buy, Price(100)), vec![a, b]);

    book.apply_cancel(a, ts(3)).unwrap();
    let level = book.bids().level(Price(100)).unwrap();
    assert_eq!(level.total_size, Size(2));
    assert_eq!(level.order_count, 1);
    assert_eq!(book.queue_at(Side::Buy, Price(100)), vec![b]);
}

/// Level eviction: cancelling the only order at a price unlinks the
/// level everywhere.
#[test]
fn level_eviction() {
    let a = Uuid::new_v4();
    let mut book = LimitOrderBook::new("BTC-USD");
    book.apply_add(a, Side::Buy, Price(100), Size(1), ts(1)).unwrap();

    book.apply_cancel(a, ts(2)).unwrap();
    assert!(book.aggregated_levels(None).bids.is_empty());
    assert_eq!(book.bids().len(), 0);
    assert_eq!(book.best_bid(), None);
    book.validate().unwrap();
}

/// Change semantics: the size delta flows through level and aggregate
/// totals, and a change to zero removes the level.
#[test]
fn change_semantics() {
    let a = Uuid::new_v4();
    let mut book = LimitOrderBook::new("BTC-USD");
    book.apply_add(a, Side::Buy, Price(100), Size(5), ts(1)).unwrap();

    book.apply_change(a, Size(2), ts(2)).unwrap();
    assert_eq!(book.order_size(&a), Some(Size(2)));
    assert_eq!(book.bids().level(Price(100)).unwrap().total_size, Size(2));
    assert_eq!(
        book.aggregated_levels(None).bids,
        vec![(Price(100), Size(2))]
    );

    book.apply_change(a, Size::ZERO, ts(3)).unwrap();
    assert!(book.bids().is_empty());
    assert!(book.aggregated_levels(None).bids.is_empty());
    book.validate().unwrap();
}

/// Snapshot/backfill seam: live events that race ahead of the snapshot
/// are buffered, then replayed in order once the snapshot is applied.
#[test]
fn snapshot_backfill_seam() {
    let (tx, rx) = unbounded();
    tx.send(Some(open_msg(Uuid::new_v4(), Side::Buy, "0.99", "0.00000001", 10)))
        .unwrap();
    tx.send(Some(open_msg(Uuid::new_v4(), Side::Buy, "0.98", "0.00000001", 11)))
        .unwrap();
    tx.send(Some(FeedMessage::Snapshot {
        sequence: Some(9),
        order_id: Some(Uuid::new_v4()),
        side: Some(Side::Buy),
        price: Some("1.00".to_string()),
        remaining_size: Some("0.00000001".to_string()),
    }))
    .unwrap();
    tx.send(None).unwrap();

    let report = OrderbookBuilder::new(
        BuilderConfig {
            snapshot_order_count: 1,
            ..config()
        },
        rx,
    )
    .run();

    let depth = report.book.aggregated_levels(None);
    assert_eq!(
        depth.bids,
        vec![
            (Price(100), Size(1)),
            (Price(99), Size(1)),
            (Price(98), Size(1)),
        ]
    );
    assert!(report.missing_sequences.is_empty());
    report.book.validate().unwrap();
}

/// Gap detection: a jump from 2 to 5 records 3 and 4 as missing and
/// processing continues normally.
#[test]
fn gap_detection() {
    let (tx, rx) = unbounded();
    for seq in [1u64, 2, 5] {
        tx.send(Some(open_msg(
            Uuid::new_v4(),
            Side::Buy,
            &format!("{seq}.00"),
            "1.0",
            seq,
        )))
        .unwrap();
    }
    tx.send(None).unwrap();

    let report = OrderbookBuilder::new(config(), rx).run();
    assert_eq!(report.missing_sequences, vec![3, 4]);
    assert_eq!(report.book.order_count(), 3);
}

/// Rotation correctness: ascending inserts 10, 20, 30 into an empty ask
/// side re-root the tree at 20 with balanced children.
#[test]
fn rotation_correctness() {
    let mut book = LimitOrderBook::new("BTC-USD");
    for price in [10u64, 20, 30] {
        book.apply_add(Uuid::new_v4(), Side::Sell, Price(price), Size(1), ts(0))
            .unwrap();
    }

    let asks = book.asks();
    assert_eq!(asks.root_price(), Some(Price(20)));
    let root = asks.shape(Price(20)).unwrap();
    assert_eq!(root.left, Some(Price(10)));
    assert_eq!(root.right, Some(Price(30)));
    assert_eq!(root.balance_factor, 0);
    assert_eq!(asks.shape(Price(10)).unwrap().balance_factor, 0);
    assert_eq!(asks.shape(Price(30)).unwrap().balance_factor, 0);
    assert_eq!(asks.shape(Price(10)).unwrap().parent, Some(Price(20)));
    book.validate().unwrap();
}

/// Idempotent cancel through the worker: a duplicate done leaves the
/// same observable state as a single one.
#[test]
fn idempotent_cancel() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let (tx, rx) = unbounded();
    tx.send(Some(open_msg(a, Side::Buy, "100.00", "1.0", 1))).unwrap();
    tx.send(Some(open_msg(b, Side::Buy, "99.00", "1.0", 2))).unwrap();
    for (seq, uid) in [(3u64, a), (4, a)] {
        tx.send(Some(FeedMessage::Done {
            sequence: Some(seq),
            order_id: Some(uid),
            side: Some(Side::Buy),
            price: None,
            remaining_size: None,
            reason: Some("canceled".to_string()),
            time: Some(ts(seq as u32)),
            product_id: Some("BTC-USD".to_string()),
        }))
        .unwrap();
    }
    tx.send(None).unwrap();

    let report = OrderbookBuilder::new(config(), rx).run();
    assert_eq!(report.book.order_count(), 1);
    assert_eq!(
        report.book.aggregated_levels(None).bids,
        vec![(Price(9_900), Size(100_000_000))]
    );
    report.book.validate().unwrap();
}
