//! Match side-stream: trade records, CSV persistence, and OHLC candles.
//!
//! `match` events do not mutate the book (the consumed liquidity arrives
//! separately as `change`/`done` messages); they feed this module, which
//! keeps the trade tape and optionally aggregates time-bucketed candles.
//! Both persist to CSV in interval-gated chunks.

mod candles;
mod tape;


pub use candles::{Candle, CandleSeries};
pub use tape::{TradeRecord, TradeTape};

use thiserror::Error;

/// Errors raised while persisting side-stream chunks.
#[derive(Debug, Error)]
pub enum SideStreamError {
    /// CSV encoding failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure.
    #[error("side-stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}
