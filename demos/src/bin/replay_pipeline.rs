// demos/src/bin/replay_pipeline.rs
//
// Replays a recorded gzip feed dump through the full pipeline and
// prints depth frames as they come off the output queue.
//
// Usage:
//   cargo run --bin replay_pipeline -- <feed.json.gz> [snapshot.json.gz]

use crossbeam::channel::{bounded, unbounded};
use lobfeed_rs::feed::{FeedReplayer, SnapshotDocument};
use lobfeed_rs::ingest::{BuilderConfig, OrderbookBuilder};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(feed_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: replay_pipeline <feed.json.gz> [snapshot.json.gz]");
        std::process::exit(2);
    };
    let snapshot_path = args.next().map(PathBuf::from);

    let mut config = BuilderConfig {
        load_feed_filepath: Some(feed_path.clone()),
        ..BuilderConfig::default()
    };
    let (feed_tx, feed_rx) = unbounded();
    let (depth_tx, depth_rx) = bounded(config.output_queue_capacity);

    // Seed the queue from the snapshot before the replay starts, so the
    // worker sees the same ordering as the live pipeline.
    if let Some(path) = snapshot_path {
        let snapshot = SnapshotDocument::read_gzip(&path)?;
        info!(
            "snapshot at sequence {} with {} orders",
            snapshot.sequence,
            snapshot.order_count()
        );
        config.snapshot_order_count = snapshot.load_into_queue(&feed_tx, config.depth);
    }

    let notation = config.notation;
    let replay_path = config
        .load_feed_filepath
        .clone()
        .unwrap_or_else(|| feed_path.clone());
    let worker = OrderbookBuilder::new(config, feed_rx)
        .with_output(depth_tx)
        .spawn()?;
    let replayer = FeedReplayer::spawn(&replay_path, feed_tx)?;

    // Consume depth frames until the worker sends the end sentinel.
    let mut frames = 0u64;
    while let Ok(Some(frame)) = depth_rx.recv() {
        frames += 1;
        if frames % 1_000 == 1 {
            let wire = frame.to_wire(&notation);
            let best_bid = wire.bid_levels.first();
            let best_ask = wire.ask_levels.first();
            info!(
                "frame {} seq {}: best bid {:?}, best ask {:?}",
                frames, wire.sequence, best_bid, best_ask
            );
        }
    }

    let replay_stats = replayer.join().expect("replayer thread panicked");
    let report = worker.join().expect("worker thread panicked");

    info!(
        "replayed {} lines ({} undecodable); consumed {frames} depth frames",
        replay_stats.lines, replay_stats.undecodable
    );
    info!(
        "final book: {} orders, best bid {:?}, best ask {:?}",
        report.book.order_count(),
        report.book.best_bid(),
        report.book.best_ask()
    );
    report.book.validate()?;
    info!("final book passed validation");
    Ok(())
}
