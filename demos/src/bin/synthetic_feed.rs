// demos/src/bin/synthetic_feed.rs
//
// Drives the pipeline with a synthetic Level-3 feed generated in
// process: a snapshot seeds the book, then a producer thread emits a
// stream of opens, changes, dones and matches around a drifting mid
// price. Useful for eyeballing worker behaviour without a recorded
// feed.
//
// Usage:
//   cargo run --bin synthetic_feed -- [event_count]

use chrono::Utc;
use crossbeam::channel::{bounded, unbounded};
use lobfeed_rs::feed::{FeedMessage, SnapshotDocument, SnapshotEntry};
use lobfeed_rs::ingest::{BuilderConfig, DisplayFlags, OrderbookBuilder};
use lobfeed_rs::orderbook::Side;
use std::error::Error;
use tracing::info;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let event_count: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(10_000);

    let (feed_tx, feed_rx) = unbounded();

    // Seed ten levels a side around 20000.00.
    let snapshot = SnapshotDocument {
        sequence: 1_000,
        bids: (0..10)
            .map(|i| {
                SnapshotEntry(
                    format!("{}.00", 19_999 - i),
                    "1.00000000".to_string(),
                    Uuid::new_v4(),
                )
            })
            .collect(),
        asks: (0..10)
            .map(|i| {
                SnapshotEntry(
                    format!("{}.00", 20_001 + i),
                    "1.00000000".to_string(),
                    Uuid::new_v4(),
                )
            })
            .collect(),
    };

    let config = BuilderConfig {
        snapshot_order_count: snapshot.load_into_queue(&feed_tx, None),
        build_candles: true,
        display: DisplayFlags::MATCH,
        queue_stats_interval: 5.0,
        ..BuilderConfig::default()
    };
    let notation = config.notation;
    let (depth_tx, depth_rx) = bounded(config.output_queue_capacity);

    let worker = OrderbookBuilder::new(config, feed_rx)
        .with_output(depth_tx)
        .spawn()?;

    // Producer: a cheap deterministic walk keyed off the event index.
    let producer = std::thread::spawn(move || {
        let mut sequence = 1_000u64;
        let mut live: Vec<Uuid> = Vec::new();
        for i in 0..event_count {
            sequence += 1;
            let price = 19_990 + (i * 7 + i / 13) % 20;
            let side = if price < 20_000 { Side::Buy } else { Side::Sell };
            let message = match i % 5 {
                0 | 1 | 2 => {
                    let uid = Uuid::new_v4();
                    live.push(uid);
                    FeedMessage::Open {
                        sequence: Some(sequence),
                        order_id: Some(uid),
                        side: Some(side),
                        price: Some(format!("{price}.00")),
                        remaining_size: Some("0.50000000".to_string()),
                        time: Some(Utc::now()),
                        product_id: Some("BTC-USD".to_string()),
                    }
                }
                3 if !live.is_empty() => {
                    let uid = live[i as usize % live.len()];
                    FeedMessage::Change {
                        sequence: Some(sequence),
                        order_id: Some(uid),
                        side: Some(side),
                        price: None,
                        old_size: None,
                        new_size: Some("0.25000000".to_string()),
                        time: Some(Utc::now()),
                        product_id: Some("BTC-USD".to_string()),
                    }
                }
                _ if !live.is_empty() => {
                    let uid = live.swap_remove(i as usize % live.len());
                    FeedMessage::Done {
                        sequence: Some(sequence),
                        order_id: Some(uid),
                        side: Some(side),
                        price: None,
                        remaining_size: None,
                        reason: Some("canceled".to_string()),
                        time: Some(Utc::now()),
                        product_id: Some("BTC-USD".to_string()),
                    }
                }
                _ => continue,
            };
            if feed_tx.send(Some(message)).is_err() {
                return;
            }
        }
        let _ = feed_tx.send(None);
    });

    let mut frames = 0u64;
    let mut last_best = (None, None);
    while let Ok(Some(frame)) = depth_rx.recv() {
        frames += 1;
        let best = (
            frame.levels.best_bid().map(|(p, _)| p),
            frame.levels.best_ask().map(|(p, _)| p),
        );
        if best != last_best {
            info!(
                "seq {}: top of book {:?} / {:?}",
                frame.sequence,
                best.0.map(|p| notation.format_price(p)),
                best.1.map(|p| notation.format_price(p)),
            );
            last_best = best;
        }
    }

    producer.join().expect("producer thread panicked");
    let report = worker.join().expect("worker thread panicked");
    info!(
        "consumed {frames} depth frames; {} dropped under backpressure",
        report.stats.frames_dropped
    );
    info!(
        "final book holds {} orders across {} bid / {} ask levels",
        report.book.order_count(),
        report.book.bids().len(),
        report.book.asks().len()
    );
    report.book.validate()?;
    Ok(())
}
