//! Ingest worker configuration.

use crate::feed::MessageKind;
use crate::orderbook::Notation;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

bitflags! {
    /// Per-kind console display switches; observability only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DisplayFlags: u8 {
        /// Show subscription acknowledgements.
        const SUBSCRIPTIONS = 1 << 0;
        /// Show received messages.
        const RECEIVED = 1 << 1;
        /// Show open messages.
        const OPEN = 1 << 2;
        /// Show done messages.
        const DONE = 1 << 3;
        /// Show match messages.
        const MATCH = 1 << 4;
        /// Show change messages.
        const CHANGE = 1 << 5;
        /// Show snapshot messages.
        const SNAPSHOT = 1 << 6;
    }
}

impl DisplayFlags {
    /// Whether messages of `kind` should be displayed.
    pub fn shows(self, kind: MessageKind) -> bool {
        let flag = match kind {
            MessageKind::Subscriptions => DisplayFlags::SUBSCRIPTIONS,
            MessageKind::Received => DisplayFlags::RECEIVED,
            MessageKind::Open => DisplayFlags::OPEN,
            MessageKind::Done => DisplayFlags::DONE,
            MessageKind::Match => DisplayFlags::MATCH,
            MessageKind::Change => DisplayFlags::CHANGE,
            MessageKind::Snapshot => DisplayFlags::SNAPSHOT,
        };
        self.contains(flag)
    }
}

/// Configuration for one instrument's ingest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Exchange label used in logs and persisted filenames.
    pub exchange: String,

    /// Instrument identifier, e.g. `BTC-USD`.
    pub market: String,

    /// Number of snapshot messages expected on the input queue. Drives
    /// the Snapshot→Backfill transition; `0` skips both phases.
    pub snapshot_order_count: usize,

    /// Seconds between side-stream persistence flushes.
    pub save_interval: f64,

    /// Seconds between orderbook validity checks.
    pub lob_check_interval: f64,

    /// Seconds between queue statistics emissions.
    pub queue_stats_interval: f64,

    /// Seconds between idle-queue log notes.
    pub queue_empty_interval: f64,

    /// Output queue capacity before frames are dropped.
    pub output_queue_capacity: usize,

    /// Per-kind console display switches.
    pub display: DisplayFlags,

    /// When set, events are replayed from this gzip feed dump instead of
    /// a live websocket.
    pub load_feed_filepath: Option<PathBuf>,

    /// Build OHLC candles from the match side-stream.
    pub build_candles: bool,

    /// Candle bucket length in seconds.
    pub candle_interval: f64,

    /// Cap on per-side levels loaded from the snapshot document.
    pub depth: Option<usize>,

    /// Directory for persisted trade and candle chunks.
    pub output_folder: PathBuf,

    /// Escalate a late snapshot (seam hole) from a warning to an
    /// immediate stop.
    pub halt_on_late_snapshot: bool,

    /// Fixed-point scale of the market.
    pub notation: Notation,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            exchange: "coinbase".to_string(),
            market: "BTC-USD".to_string(),
            snapshot_order_count: 0,
            save_interval: 360.0,
            lob_check_interval: 60.0,
            queue_stats_interval: 60.0,
            queue_empty_interval: 60.0,
            output_queue_capacity: 2,
            display: DisplayFlags::empty(),
            load_feed_filepath: None,
            build_candles: false,
            candle_interval: 60.0,
            depth: None,
            output_folder: PathBuf::from("data"),
            halt_on_late_snapshot: false,
            notation: Notation::default(),
        }
    }
}

impl BuilderConfig {
    /// `save_interval` as a [`Duration`].
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs_f64(self.save_interval)
    }

    /// `lob_check_interval` as a [`Duration`].
    pub fn lob_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.lob_check_interval)
    }

    /// `queue_stats_interval` as a [`Duration`].
    pub fn queue_stats_interval(&self) -> Duration {
        Duration::from_secs_f64(self.queue_stats_interval)
    }

    /// `queue_empty_interval` as a [`Duration`].
    pub fn queue_empty_interval(&self) -> Duration {
        Duration::from_secs_f64(self.queue_empty_interval)
    }

    /// `candle_interval` as a [`Duration`].
    pub fn candle_interval(&self) -> Duration {
        Duration::from_secs_f64(self.candle_interval)
    }
}
