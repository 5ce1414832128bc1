//! Aggregated depth snapshots for downstream consumers.
//!
//! The `price → total size` projection of the book is the canonical
//! product of the pipeline. [`DepthLevels`] is the in-memory form cut
//! from the book; [`DepthFrame`] pairs it with the event timestamp and
//! sequence and is what travels on the output queue. `None` on that
//! queue signals end-of-stream.

use super::types::{Notation, Price, Size};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Both sides of the book as ordered `(price, size)` pairs: bids in
/// descending and asks in ascending price order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DepthLevels {
    /// Bid levels, best (highest) first.
    pub bids: Vec<(Price, Size)>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<(Price, Size)>,
}

impl DepthLevels {
    /// The best bid price and size.
    pub fn best_bid(&self) -> Option<(Price, Size)> {
        self.bids.first().copied()
    }

    /// The best ask price and size.
    pub fn best_ask(&self) -> Option<(Price, Size)> {
        self.asks.first().copied()
    }

    /// `best_ask − best_bid` when both sides are populated. Transiently
    /// zero or negative around trades, when match events precede the
    /// done events for the consumed liquidity.
    pub fn spread(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask.ticks() as i64 - bid.ticks() as i64),
            _ => None,
        }
    }

    /// `true` when neither side holds a level.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// One depth snapshot on the output queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthFrame {
    /// Event time of the mutation that produced this frame.
    pub timestamp: DateTime<Utc>,
    /// Sequence of the mutation that produced this frame.
    pub sequence: u64,
    /// Aggregated levels at frame time.
    pub levels: DepthLevels,
}

impl DepthFrame {
    /// Frame timestamp in the `MM/DD/YYYY-HH:MM:SS` display format used
    /// by downstream consumers.
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format("%m/%d/%Y-%H:%M:%S").to_string()
    }

    /// Render the frame into its wire schema, with decimal-string prices
    /// and sizes at the market scale.
    pub fn to_wire(&self, notation: &Notation) -> WireDepthFrame {
        let render = |levels: &[(Price, Size)]| {
            levels
                .iter()
                .map(|(p, s)| (notation.format_price(*p), notation.format_size(*s)))
                .collect()
        };
        WireDepthFrame {
            timestamp: self.timestamp_display(),
            sequence: self.sequence,
            bid_levels: render(&self.levels.bids),
            ask_levels: render(&self.levels.asks),
        }
    }
}

/// The serialized form of a depth frame handed to external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireDepthFrame {
    /// `MM/DD/YYYY-HH:MM:SS` event timestamp.
    pub timestamp: String,
    /// Sequence of the producing mutation.
    pub sequence: u64,
    /// Bid levels best-first as decimal strings.
    pub bid_levels: Vec<(String, String)>,
    /// Ask levels best-first as decimal strings.
    pub ask_levels: Vec<(String, String)>,
}
