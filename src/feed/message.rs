//! Typed wire messages for the Level-3 feed.
//!
//! Feed JSON is parsed at the boundary into [`FeedMessage`], a tagged
//! enum with typed fields; the ingest worker never touches raw JSON.
//! Fields the exchange may omit are `Option`s — per-kind required-field
//! validation happens when a message is turned into a book operation, so
//! a malformed message can still contribute its sequence number to the
//! reconciler before being skipped.

use crate::orderbook::{Notation, OrderId, Price, Side, Size, ValueError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while decoding or validating feed input.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A required field is absent for the message kind.
    #[error("malformed {kind} message: missing {field}")]
    MissingField {
        /// The message kind being validated.
        kind: MessageKind,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A decimal string failed fixed-point conversion.
    #[error("bad {field} in {kind} message: {source}")]
    BadValue {
        /// The message kind being validated.
        kind: MessageKind,
        /// Name of the offending field.
        field: &'static str,
        /// The conversion failure.
        #[source]
        source: ValueError,
    },

    /// A feed line is not valid JSON for any message kind.
    #[error("undecodable feed line: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure on a feed or snapshot file.
    #[error("feed I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot document carried no orders.
    #[error("snapshot document holds no orders")]
    EmptySnapshot,

    /// A persisted snapshot package failed its integrity check.
    #[error("snapshot checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// The checksum stored in the package.
        expected: String,
        /// The checksum computed from the document.
        actual: String,
    },
}

/// The seven message kinds the feed can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Channel subscription acknowledgement.
    Subscriptions,
    /// Pre-open lifecycle notification.
    Received,
    /// An order became visible on the book.
    Open,
    /// An order left the book (filled or cancelled).
    Done,
    /// A trade printed.
    Match,
    /// An order's open size changed.
    Change,
    /// One order of the seeding snapshot.
    Snapshot,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Subscriptions => "subscriptions",
            MessageKind::Received => "received",
            MessageKind::Open => "open",
            MessageKind::Done => "done",
            MessageKind::Match => "match",
            MessageKind::Change => "change",
            MessageKind::Snapshot => "snapshot",
        };
        write!(f, "{name}")
    }
}

/// A single subscribed channel in a `subscriptions` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSub {
    /// Channel name, e.g. `full`.
    pub name: String,
    /// Instruments covered by the subscription.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// One message from the Level-3 feed, tagged by `type`.
///
/// Prices and sizes arrive as decimal strings and stay strings here; the
/// worker converts them through the market [`Notation`] when it builds
/// the corresponding book operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Acknowledgement of the channel subscription. Carries no sequence.
    Subscriptions {
        /// The channels now subscribed.
        #[serde(default)]
        channels: Vec<ChannelSub>,
    },

    /// The exchange accepted an order; it is not yet on the book.
    Received {
        /// Feed sequence number.
        sequence: Option<u64>,
        /// The order id.
        order_id: Option<OrderId>,
        /// Client-assigned id, if the submitter attached one.
        client_oid: Option<String>,
        /// Order side.
        side: Option<Side>,
        /// Event time.
        time: Option<DateTime<Utc>>,
        /// Instrument identifier.
        product_id: Option<String>,
    },

    /// An order became visible on the book.
    Open {
        /// Feed sequence number.
        sequence: Option<u64>,
        /// The order id.
        order_id: Option<OrderId>,
        /// Order side.
        side: Option<Side>,
        /// Limit price as a decimal string.
        price: Option<String>,
        /// Size still open as a decimal string.
        remaining_size: Option<String>,
        /// Event time.
        time: Option<DateTime<Utc>>,
        /// Instrument identifier.
        product_id: Option<String>,
    },

    /// An order left the book.
    Done {
        /// Feed sequence number.
        sequence: Option<u64>,
        /// The order id.
        order_id: Option<OrderId>,
        /// Order side.
        side: Option<Side>,
        /// Limit price as a decimal string.
        price: Option<String>,
        /// Size remaining when the order left, as a decimal string.
        remaining_size: Option<String>,
        /// Why the order finished (`filled` or `canceled`).
        reason: Option<String>,
        /// Event time.
        time: Option<DateTime<Utc>>,
        /// Instrument identifier.
        product_id: Option<String>,
    },

    /// A trade printed between a resting maker and an incoming taker.
    Match {
        /// Feed sequence number.
        sequence: Option<u64>,
        /// Exchange-assigned trade id.
        trade_id: Option<u64>,
        /// Resting order consumed by the trade.
        maker_order_id: Option<OrderId>,
        /// Aggressing order.
        taker_order_id: Option<OrderId>,
        /// Maker side of the trade.
        side: Option<Side>,
        /// Traded size as a decimal string.
        size: Option<String>,
        /// Trade price as a decimal string.
        price: Option<String>,
        /// Event time.
        time: Option<DateTime<Utc>>,
        /// Instrument identifier.
        product_id: Option<String>,
    },

    /// An order's open size changed in place.
    Change {
        /// Feed sequence number.
        sequence: Option<u64>,
        /// The order id.
        order_id: Option<OrderId>,
        /// Order side.
        side: Option<Side>,
        /// Limit price as a decimal string.
        price: Option<String>,
        /// Size before the change, as a decimal string.
        old_size: Option<String>,
        /// Size after the change, as a decimal string.
        new_size: Option<String>,
        /// Event time.
        time: Option<DateTime<Utc>>,
        /// Instrument identifier.
        product_id: Option<String>,
    },

    /// One order of the seeding snapshot. All snapshot messages of one
    /// document share the document's sequence number.
    Snapshot {
        /// The snapshot document's sequence number.
        sequence: Option<u64>,
        /// The order id.
        order_id: Option<OrderId>,
        /// Order side.
        side: Option<Side>,
        /// Limit price as a decimal string.
        price: Option<String>,
        /// Open size as a decimal string.
        remaining_size: Option<String>,
    },
}

/// A validated add operation extracted from an `open` or `snapshot`
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAdd {
    /// The order id.
    pub order_id: OrderId,
    /// Order side.
    pub side: Side,
    /// Limit price in tick units.
    pub price: Price,
    /// Open size in lot units.
    pub size: Size,
    /// Event time (snapshot messages carry none; the loader stamps them).
    pub time: Option<DateTime<Utc>>,
}

/// A validated size change extracted from a `change` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderChange {
    /// The order id.
    pub order_id: OrderId,
    /// New open size in lot units.
    pub new_size: Size,
    /// Event time.
    pub time: Option<DateTime<Utc>>,
}

impl FeedMessage {
    /// The kind tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            FeedMessage::Subscriptions { .. } => MessageKind::Subscriptions,
            FeedMessage::Received { .. } => MessageKind::Received,
            FeedMessage::Open { .. } => MessageKind::Open,
            FeedMessage::Done { .. } => MessageKind::Done,
            FeedMessage::Match { .. } => MessageKind::Match,
            FeedMessage::Change { .. } => MessageKind::Change,
            FeedMessage::Snapshot { .. } => MessageKind::Snapshot,
        }
    }

    /// The sequence number, when the kind carries one.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            FeedMessage::Subscriptions { .. } => None,
            FeedMessage::Received { sequence, .. }
            | FeedMessage::Open { sequence, .. }
            | FeedMessage::Done { sequence, .. }
            | FeedMessage::Match { sequence, .. }
            | FeedMessage::Change { sequence, .. }
            | FeedMessage::Snapshot { sequence, .. } => *sequence,
        }
    }

    /// The event time, when present.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            FeedMessage::Subscriptions { .. } | FeedMessage::Snapshot { .. } => None,
            FeedMessage::Received { time, .. }
            | FeedMessage::Open { time, .. }
            | FeedMessage::Done { time, .. }
            | FeedMessage::Match { time, .. }
            | FeedMessage::Change { time, .. } => *time,
        }
    }

    /// The order id, for kinds that reference a specific order.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            FeedMessage::Received { order_id, .. }
            | FeedMessage::Open { order_id, .. }
            | FeedMessage::Done { order_id, .. }
            | FeedMessage::Change { order_id, .. }
            | FeedMessage::Snapshot { order_id, .. } => *order_id,
            FeedMessage::Subscriptions { .. } | FeedMessage::Match { .. } => None,
        }
    }

    /// Validate an `open` or `snapshot` message into an add operation.
    ///
    /// # Errors
    /// [`FeedError::MissingField`] when a required field is absent and
    /// [`FeedError::BadValue`] when a decimal string does not fit the
    /// market notation. Calling this on any other kind is a logic error
    /// and reports the order id as missing.
    pub fn to_order_add(&self, notation: &Notation) -> Result<OrderAdd, FeedError> {
        let kind = self.kind();
        let (order_id, side, price, remaining_size, time) = match self {
            FeedMessage::Open {
                order_id,
                side,
                price,
                remaining_size,
                time,
                ..
            } => (*order_id, *side, price, remaining_size, *time),
            FeedMessage::Snapshot {
                order_id,
                side,
                price,
                remaining_size,
                ..
            } => (*order_id, *side, price, remaining_size, None),
            _ => {
                return Err(FeedError::MissingField {
                    kind,
                    field: "order_id",
                });
            }
        };
        let order_id = order_id.ok_or(FeedError::MissingField {
            kind,
            field: "order_id",
        })?;
        let side = side.ok_or(FeedError::MissingField { kind, field: "side" })?;
        let price = required_price(kind, "price", price.as_deref(), notation)?;
        let size = required_size(kind, "remaining_size", remaining_size.as_deref(), notation)?;
        Ok(OrderAdd {
            order_id,
            side,
            price,
            size,
            time,
        })
    }

    /// Validate a `change` message into a size-change operation.
    ///
    /// # Errors
    /// Same contract as [`FeedMessage::to_order_add`].
    pub fn to_order_change(&self, notation: &Notation) -> Result<OrderChange, FeedError> {
        let kind = self.kind();
        let FeedMessage::Change {
            order_id,
            new_size,
            time,
            ..
        } = self
        else {
            return Err(FeedError::MissingField {
                kind,
                field: "order_id",
            });
        };
        let order_id = (*order_id).ok_or(FeedError::MissingField {
            kind,
            field: "order_id",
        })?;
        let new_size = required_size(kind, "new_size", new_size.as_deref(), notation)?;
        Ok(OrderChange {
            order_id,
            new_size,
            time: *time,
        })
    }

    /// Parse one line of feed JSON.
    ///
    /// # Errors
    /// [`FeedError::Json`] when the line does not decode into any kind.
    pub fn from_json_line(line: &str) -> Result<FeedMessage, FeedError> {
        Ok(serde_json::from_str(line)?)
    }
}

fn required_price(
    kind: MessageKind,
    field: &'static str,
    value: Option<&str>,
    notation: &Notation,
) -> Result<Price, FeedError> {
    let raw = value.ok_or(FeedError::MissingField { kind, field })?;
    notation
        .parse_price(raw)
        .map_err(|source| FeedError::BadValue { kind, field, source })
}

fn required_size(
    kind: MessageKind,
    field: &'static str,
    value: Option<&str>,
    notation: &Notation,
) -> Result<Size, FeedError> {
    let raw = value.ok_or(FeedError::MissingField { kind, field })?;
    notation
        .parse_size(raw)
        .map_err(|source| FeedError::BadValue { kind, field, source })
}
