//! Time-bucketed OHLC + volume aggregation of the trade stream.

use super::SideStreamError;
use super::tape::{TradeRecord, open_chunk};
use crate::orderbook::{Notation, Price, Size};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One OHLC + volume bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candle {
    /// Bucket start time (inclusive).
    pub start: DateTime<Utc>,
    /// First trade price in the bucket.
    pub open: Price,
    /// Highest trade price in the bucket.
    pub high: Price,
    /// Lowest trade price in the bucket.
    pub low: Price,
    /// Last trade price in the bucket.
    pub close: Price,
    /// Total traded size in the bucket.
    pub volume: Size,
    /// Number of trades in the bucket.
    pub trades: u64,
}

impl Candle {
    fn seed(start: DateTime<Utc>, trade: &TradeRecord) -> Self {
        Self {
            start,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.size,
            trades: 1,
        }
    }

    fn absorb(&mut self, trade: &TradeRecord) {
        self.high = self.high.max(trade.price);
        self.low = self.low.min(trade.price);
        self.close = trade.price;
        self.volume = self.volume.saturating_add(trade.size);
        self.trades += 1;
    }
}

/// CSV row shape for persisted candles, with decimal-string values.
#[derive(Debug, Serialize)]
struct CandleRow {
    start: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    trades: u64,
}

/// Rolling candle aggregation with chunked CSV persistence.
///
/// Trades are assigned to fixed buckets aligned to the epoch. A trade
/// landing in a new bucket seals the current candle; sealed candles are
/// persisted by [`save_chunk`](CandleSeries::save_chunk).
#[derive(Debug)]
pub struct CandleSeries {
    bucket_seconds: i64,
    sealed: Vec<Candle>,
    current: Option<Candle>,
    persisted: usize,
    notation: Notation,
    path: PathBuf,
    file_started: bool,
}

impl CandleSeries {
    /// Create a series with the given bucket length, persisting to
    /// `<folder>/<exchange>_<market>_candles_<stamp>.csv`.
    pub fn new(
        folder: &Path,
        exchange: &str,
        market: &str,
        bucket: Duration,
        notation: Notation,
    ) -> Self {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = folder.join(format!("{exchange}_{market}_candles_{stamp}.csv"));
        Self {
            bucket_seconds: bucket.as_secs().max(1) as i64,
            sealed: Vec::new(),
            current: None,
            persisted: 0,
            notation,
            path,
            file_started: false,
        }
    }

    /// Number of candles built so far, including the open one.
    pub fn len(&self) -> usize {
        self.sealed.len() + usize::from(self.current.is_some())
    }

    /// `true` when no trade has been absorbed.
    pub fn is_empty(&self) -> bool {
        self.sealed.is_empty() && self.current.is_none()
    }

    /// Sealed candles in chronological order.
    pub fn sealed(&self) -> &[Candle] {
        &self.sealed
    }

    /// The candle currently being built.
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Path of the CSV chunk file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absorb one trade into the series.
    pub fn update(&mut self, trade: &TradeRecord) {
        let start = self.bucket_start(trade.time);
        match &mut self.current {
            Some(candle) if candle.start == start => candle.absorb(trade),
            Some(candle) if start > candle.start => {
                self.sealed.push(*candle);
                self.current = Some(Candle::seed(start, trade));
            }
            Some(candle) => {
                // Out-of-order trade behind the open bucket; fold it in
                // rather than rewriting sealed history.
                candle.absorb(trade);
            }
            None => self.current = Some(Candle::seed(start, trade)),
        }
    }

    /// Seal the open candle, e.g. at shutdown.
    pub fn seal(&mut self) {
        if let Some(candle) = self.current.take() {
            self.sealed.push(candle);
        }
    }

    /// Persist every not-yet-saved sealed candle as a CSV chunk.
    ///
    /// # Errors
    /// [`SideStreamError`] on filesystem or encoding failure; unsaved
    /// candles stay queued for the next attempt.
    pub fn save_chunk(&mut self) -> Result<usize, SideStreamError> {
        let pending = self.sealed.len() - self.persisted;
        if pending == 0 {
            return Ok(0);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = open_chunk(&self.path, self.file_started)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(!self.file_started)
            .from_writer(file);
        for candle in &self.sealed[self.persisted..] {
            writer.serialize(CandleRow {
                start: candle.start.to_rfc3339(),
                open: self.notation.format_price(candle.open),
                high: self.notation.format_price(candle.high),
                low: self.notation.format_price(candle.low),
                close: self.notation.format_price(candle.close),
                volume: self.notation.format_size(candle.volume),
                trades: candle.trades,
            })?;
        }
        writer.flush()?;
        self.file_started = true;
        self.persisted = self.sealed.len();
        debug!("saved {pending} candles to {}", self.path.display());
        Ok(pending)
    }

    fn bucket_start(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let secs = time.timestamp();
        let start = secs - secs.rem_euclid(self.bucket_seconds);
        Utc.timestamp_opt(start, 0).single().unwrap_or(time)
    }
}
