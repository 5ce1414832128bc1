//! # Level-3 Feed Ingestion & Limit Order Book Replica
//!
//! A real-time market-data pipeline that consumes a cryptocurrency
//! exchange's Level-3 feed (order-by-order updates plus an initial
//! orderbook snapshot) and maintains an in-memory limit order book per
//! instrument, continuously exposing aggregated price-level depth to
//! downstream consumers.
//!
//! ## Pipeline
//!
//! ```text
//! [websocket] ─┐
//!              ├─► input queue ─► OrderbookBuilder ─► LimitOrderBook
//! [snapshot]  ─┘                        │                    │
//!                                       │                    ▼
//!                                       │            aggregated depth ─► output queue
//!                                       └─► trade tape / candles ─► CSV chunks
//! ```
//!
//! Producers (websocket reader, snapshot loader, file replayer) push
//! typed [`feed::FeedMessage`]s onto a multi-producer input queue. One
//! dedicated worker thread — the [`ingest::OrderbookBuilder`] — owns the
//! book and runs a linear phase machine:
//!
//! 1. **Snapshot** — seed the book from the snapshot document's
//!    messages; live traffic arriving meanwhile is buffered.
//! 2. **Backfill** — replay the buffered traffic in FIFO order under
//!    live sequencing rules.
//! 3. **Websocket** — steady-state ingestion with interval-gated
//!    housekeeping (validity checks, stats, side-stream persistence).
//! 4. **Finish** — drain whatever remains on the input queue.
//! 5. **Stop** — emit the final depth frame and output sentinel,
//!    persist trailing buffers, log a summary, exit.
//!
//! ## The book
//!
//! [`orderbook::LimitOrderBook`] keeps each side in an arena-backed AVL
//! tree keyed by price. Every node owns a FIFO of resting orders with
//! intrusive index links, giving O(log P) insert/cancel/modify, O(1)
//! cancellation unlink by handle, and O(1) best-price reads off the
//! aggregate level maps that mirror the trees. All cross-references are
//! slot indices into flat arenas, so there are no reference cycles and
//! rotations never invalidate a handle.
//!
//! Prices and sizes are fixed-point integers ([`orderbook::Price`],
//! [`orderbook::Size`]) scaled per market by [`orderbook::Notation`];
//! feed decimal strings never round-trip through floats.
//!
//! ## Sequencing
//!
//! Every message carries a monotonically increasing sequence number.
//! Outside the snapshot phase a message is applied iff its sequence is
//! strictly greater than the current one; gaps are recorded once and
//! never repaired (the feed cannot rewind). The
//! [`ingest::SequenceTracker`] also verifies that the snapshot covers
//! the head of the live stream and flags a too-late snapshot.
//!
//! ## Backpressure
//!
//! Depth frames are emitted with a non-blocking put: a full output
//! queue drops the frame (stale depth has no value to a visualiser) and
//! never stalls ingestion. `None` on either queue is the end-of-stream
//! sentinel.
//!
//! ## Example
//!
//! ```no_run
//! use crossbeam::channel::{bounded, unbounded};
//! use lobfeed_rs::feed::SnapshotDocument;
//! use lobfeed_rs::ingest::{BuilderConfig, OrderbookBuilder};
//!
//! let (feed_tx, feed_rx) = unbounded();
//! let (depth_tx, depth_rx) = bounded(2);
//!
//! let snapshot = SnapshotDocument::read_gzip("snapshot.json.gz".as_ref())?;
//! let config = BuilderConfig {
//!     snapshot_order_count: snapshot.load_into_queue(&feed_tx, None),
//!     ..BuilderConfig::default()
//! };
//!
//! let handle = OrderbookBuilder::new(config, feed_rx)
//!     .with_output(depth_tx)
//!     .spawn()?;
//!
//! // ... websocket client pushes FeedMessages onto feed_tx,
//! //     a consumer drains depth frames from depth_rx ...
//!
//! handle.finish();
//! let report = handle.join().expect("builder thread panicked");
//! report.book.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod feed;
pub mod ingest;
pub mod orderbook;
pub mod trades;

pub mod prelude;
mod utils;

pub use feed::{FeedError, FeedMessage, MessageKind, SnapshotDocument};
pub use ingest::{BuilderConfig, BuilderHandle, BuilderReport, OrderbookBuilder};
pub use orderbook::{
    BookError, DepthFrame, DepthLevels, LimitOrderBook, Notation, OrderId, Price, Side, Size,
};
pub use trades::{CandleSeries, TradeRecord, TradeTape};
pub use utils::{IntervalGate, RunOnce, Timer, current_time_millis};
