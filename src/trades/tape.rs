//! The trade tape: typed match records and chunked CSV persistence.

use super::SideStreamError;
use crate::feed::{FeedError, FeedMessage, MessageKind};
use crate::orderbook::{Notation, OrderId, Price, Side, Size};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One trade from the feed's match stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    /// Exchange-assigned trade id.
    pub trade_id: u64,
    /// Feed sequence of the match message.
    pub sequence: u64,
    /// Trade time.
    pub time: DateTime<Utc>,
    /// Instrument identifier.
    pub product_id: String,
    /// Maker side of the trade.
    pub side: Side,
    /// Traded size in lot units.
    pub size: Size,
    /// Trade price in tick units.
    pub price: Price,
    /// Resting order consumed by the trade.
    pub maker_order_id: OrderId,
    /// Aggressing order.
    pub taker_order_id: OrderId,
}

impl TradeRecord {
    /// Validate a `match` message into a trade record.
    ///
    /// # Errors
    /// [`FeedError::MissingField`] / [`FeedError::BadValue`] under the
    /// same contract as the book-operation constructors.
    pub fn try_from_message(
        message: &FeedMessage,
        notation: &Notation,
    ) -> Result<TradeRecord, FeedError> {
        let kind = MessageKind::Match;
        let FeedMessage::Match {
            sequence,
            trade_id,
            maker_order_id,
            taker_order_id,
            side,
            size,
            price,
            time,
            product_id,
        } = message
        else {
            return Err(FeedError::MissingField {
                kind,
                field: "trade_id",
            });
        };
        let required = |field: &'static str| FeedError::MissingField { kind, field };
        let trade_id = (*trade_id).ok_or_else(|| required("trade_id"))?;
        let sequence = (*sequence).ok_or_else(|| required("sequence"))?;
        let side = (*side).ok_or_else(|| required("side"))?;
        let time = (*time).ok_or_else(|| required("time"))?;
        let maker_order_id = (*maker_order_id).ok_or_else(|| required("maker_order_id"))?;
        let taker_order_id = (*taker_order_id).ok_or_else(|| required("taker_order_id"))?;
        let raw_size = size.as_deref().ok_or_else(|| required("size"))?;
        let raw_price = price.as_deref().ok_or_else(|| required("price"))?;
        let size = notation.parse_size(raw_size).map_err(|source| {
            FeedError::BadValue {
                kind,
                field: "size",
                source,
            }
        })?;
        let price = notation.parse_price(raw_price).map_err(|source| {
            FeedError::BadValue {
                kind,
                field: "price",
                source,
            }
        })?;
        Ok(TradeRecord {
            trade_id,
            sequence,
            time,
            product_id: product_id.clone().unwrap_or_default(),
            side,
            size,
            price,
            maker_order_id,
            taker_order_id,
        })
    }
}

/// CSV row shape for persisted trades, with decimal-string values.
#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    trade_id: u64,
    sequence: u64,
    time: String,
    product_id: &'a str,
    side: &'a str,
    size: String,
    price: String,
    maker_order_id: String,
    taker_order_id: String,
}

/// In-memory tape of trades with interval-gated CSV chunk persistence.
#[derive(Debug)]
pub struct TradeTape {
    records: Vec<TradeRecord>,
    persisted: usize,
    notation: Notation,
    path: PathBuf,
    file_started: bool,
}

impl TradeTape {
    /// Create a tape persisting to
    /// `<folder>/<exchange>_<market>_matches_<stamp>.csv`.
    pub fn new(folder: &Path, exchange: &str, market: &str, notation: Notation) -> Self {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = folder.join(format!("{exchange}_{market}_matches_{stamp}.csv"));
        Self {
            records: Vec::new(),
            persisted: 0,
            notation,
            path,
            file_started: false,
        }
    }

    /// Number of trades recorded.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when no trades have been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All recorded trades in arrival order.
    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    /// Path of the CSV chunk file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a trade to the tape, optionally echoing it to the log.
    pub fn record(&mut self, trade: TradeRecord, display: bool) {
        if display {
            info!(
                "MATCH {} {} {} @ {} (trade {})",
                trade.product_id,
                trade.side,
                self.notation.format_size(trade.size),
                self.notation.format_price(trade.price),
                trade.trade_id
            );
        }
        self.records.push(trade);
    }

    /// Persist every not-yet-saved trade as a CSV chunk. The header row
    /// is written when the file is first created.
    ///
    /// # Errors
    /// [`SideStreamError`] on filesystem or encoding failure; the
    /// unsaved records stay queued for the next attempt.
    pub fn save_chunk(&mut self) -> Result<usize, SideStreamError> {
        let pending = self.records.len() - self.persisted;
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
        for trade in &self.records[self.persisted..] {
            writer.serialize(TradeRow {
                trade_id: trade.trade_id,
                sequence: trade.sequence,
                time: trade.time.to_rfc3339(),
                product_id: &trade.product_id,
                side: match trade.side {
                    Side::Buy => "buy",
                    Side::Sell => "sell",
                },
                size: self.notation.format_size(trade.size),
                price: self.notation.format_price(trade.price),
                maker_order_id: trade.maker_order_id.to_string(),
                taker_order_id: trade.taker_order_id.to_string(),
            })?;
        }
        writer.flush()?;
        self.file_started = true;
        self.persisted = self.records.len();
        debug!("saved {pending} trades to {}", self.path.display());
        Ok(pending)
    }
}

pub(super) fn open_chunk(path: &Path, append: bool) -> Result<File, std::io::Error> {
    if append {
        OpenOptions::new().append(true).open(path)
    } else {
        File::create(path)
    }
}
