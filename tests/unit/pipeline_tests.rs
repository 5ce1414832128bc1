//! Whole-pipeline tests: snapshot document → replayed feed file →
//! worker thread → depth frames on the output queue.

use crossbeam::channel::{bounded, unbounded};
use flate2::Compression;
use flate2::write::GzEncoder;
use lobfeed_rs::feed::{FeedMessage, FeedReplayer, SnapshotDocument, SnapshotEntry};
use lobfeed_rs::ingest::{BuilderConfig, OrderbookBuilder};
use lobfeed_rs::orderbook::{DepthFrame, Price, Side, Size};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

fn write_feed_dump(path: &Path, lines: &[String]) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap();
}

fn json(message: &FeedMessage) -> String {
    serde_json::to_string(message).unwrap()
}

fn open_msg(uid: Uuid, side: Side, price: &str, size: &str, seq: u64) -> FeedMessage {
    FeedMessage::Open {
        sequence: Some(seq),
        order_id: Some(uid),
        side: Some(side),
        price: Some(price.to_string()),
        remaining_size: Some(size.to_string()),
        time: Some("2022-09-15T12:00:01.000000Z".parse().unwrap()),
        product_id: Some("BTC-USD".to_string()),
    }
}

#[test]
fn snapshot_plus_replayed_feed_builds_the_book() {
    let dir = tempfile::tempdir().unwrap();

    let (a, b, c, d, e) = (
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    );

    // Snapshot captured at sequence 100.
    let snapshot = SnapshotDocument {
        sequence: 100,
        bids: vec![
            SnapshotEntry("99.00".into(), "1.0".into(), a),
            SnapshotEntry("98.00".into(), "2.0".into(), b),
        ],
        asks: vec![
            SnapshotEntry("101.00".into(), "1.0".into(), c),
            SnapshotEntry("102.00".into(), "2.0".into(), d),
        ],
    };
    let snapshot_path = dir.path().join("snapshot.json.gz");
    snapshot.write_gzip(&snapshot_path).unwrap();
    let snapshot = SnapshotDocument::read_gzip(&snapshot_path).unwrap();

    // Live feed recorded after the snapshot.
    let feed_path = dir.path().join("feed.json.gz");
    let match_msg = FeedMessage::Match {
        sequence: Some(102),
        trade_id: Some(9001),
        maker_order_id: Some(c),
        taker_order_id: Some(Uuid::new_v4()),
        side: Some(Side::Sell),
        size: Some("0.25".to_string()),
        price: Some("101.00".to_string()),
        time: Some("2022-09-15T12:00:02.000000Z".parse().unwrap()),
        product_id: Some("BTC-USD".to_string()),
    };
    let change_msg = FeedMessage::Change {
        sequence: Some(103),
        order_id: Some(b),
        side: Some(Side::Buy),
        price: Some("98.00".to_string()),
        old_size: Some("2.0".to_string()),
        new_size: Some("1.5".to_string()),
        time: Some("2022-09-15T12:00:03.000000Z".parse().unwrap()),
        product_id: Some("BTC-USD".to_string()),
    };
    let done_msg = FeedMessage::Done {
        sequence: Some(104),
        order_id: Some(d),
        side: Some(Side::Sell),
        price: None,
        remaining_size: None,
        reason: Some("canceled".to_string()),
        time: Some("2022-09-15T12:00:04.000000Z".parse().unwrap()),
        product_id: Some("BTC-USD".to_string()),
    };
    write_feed_dump(
        &feed_path,
        &[
            r#"{"type":"subscriptions","channels":[{"name":"full","product_ids":["BTC-USD"]}]}"#
                .to_string(),
            json(&open_msg(e, Side::Buy, "100.00", "0.5", 101)),
            json(&match_msg),
            json(&change_msg),
            json(&done_msg),
        ],
    );

    // Wire the pipeline: snapshot first, then the replayed live feed.
    let (feed_tx, feed_rx) = unbounded();
    let (depth_tx, depth_rx) = bounded(64);
    let order_count = snapshot.load_into_queue(&feed_tx, None);
    assert_eq!(order_count, 4);

    let config = BuilderConfig {
        snapshot_order_count: order_count,
        output_folder: dir.path().to_path_buf(),
        ..BuilderConfig::default()
    };
    let worker = OrderbookBuilder::new(config, feed_rx)
        .with_output(depth_tx)
        .spawn()
        .unwrap();
    let replayer = FeedReplayer::spawn(&feed_path, feed_tx).unwrap();

    let consumer = std::thread::spawn(move || {
        let mut frames: Vec<DepthFrame> = Vec::new();
        while let Ok(Some(frame)) = depth_rx.recv() {
            frames.push(frame);
        }
        frames
    });

    let replay_stats = replayer.join().unwrap();
    let report = worker.join().unwrap();
    let frames = consumer.join().unwrap();

    assert_eq!(replay_stats.queued, 5);
    assert_eq!(replay_stats.undecodable, 0);

    // Snapshot (4 orders) + open − done = 4 resting orders.
    assert_eq!(report.book.order_count(), 4);
    let depth = report.book.aggregated_levels(None);
    assert_eq!(
        depth.bids,
        vec![
            (Price(10_000), Size(50_000_000)),
            (Price(9_900), Size(100_000_000)),
            (Price(9_800), Size(150_000_000)),
        ]
    );
    assert_eq!(depth.asks, vec![(Price(10_100), Size(100_000_000))]);
    assert_eq!(report.trades_recorded, 1);
    assert!(report.missing_sequences.is_empty());
    report.book.validate().unwrap();

    // open, change, done each emit one frame; stop emits the final one.
    assert_eq!(frames.len(), 4);
    assert_eq!(frames.last().unwrap().sequence, 104);
    assert!(
        frames
            .last()
            .unwrap()
            .timestamp_display()
            .starts_with("09/15/2022-")
    );
}

#[test]
fn replayer_skips_undecodable_lines() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("feed.json.gz");
    write_feed_dump(
        &feed_path,
        &[
            json(&open_msg(Uuid::new_v4(), Side::Buy, "100.00", "1.0", 1)),
            "this is not json".to_string(),
            json(&open_msg(Uuid::new_v4(), Side::Buy, "99.00", "1.0", 2)),
        ],
    );

    let (tx, rx) = unbounded();
    let stats = FeedReplayer::spawn(&feed_path, tx).unwrap().join().unwrap();
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.undecodable, 1);

    // Queue holds the two messages then the EOF sentinel.
    let mut seen = Vec::new();
    while let Ok(item) = rx.recv() {
        let done = item.is_none();
        seen.push(item);
        if done {
            break;
        }
    }
    assert_eq!(seen.len(), 3);
    assert!(seen[2].is_none());
}

#[test]
fn missing_feed_file_fails_before_the_worker_starts() {
    let (tx, _rx) = unbounded();
    let err = FeedReplayer::spawn(Path::new("/nonexistent/feed.json.gz"), tx);
    assert!(err.is_err());
}
