//! Market value types shared across the book and the feed.
//!
//! Prices and sizes are fixed-point integers (tick and lot units) rather
//! than floats: the tree key and the level aggregation both require exact
//! equality, and the feed delivers decimal strings that must not round-trip
//! through `f64`. [`Notation`] holds the per-market scale and performs the
//! decimal-string conversions at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique order identifier assigned by the exchange feed.
pub type OrderId = uuid::Uuid;

/// The side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid side.
    Buy,
    /// Ask side.
    Sell,
}

impl Side {
    /// `true` for the bid side.
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Buy)
    }

    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A price in integer tick units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(pub u64);

impl Price {
    /// The zero price. Never valid for a resting order.
    pub const ZERO: Price = Price(0);

    /// Raw tick units.
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// `true` when the price is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An order size in integer lot units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Size(pub u64);

impl Size {
    /// The zero size.
    pub const ZERO: Size = Size(0);

    /// Raw lot units.
    pub fn lots(self) -> u64 {
        self.0
    }

    /// `true` when the size is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Size) -> Size {
        Size(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, other: Size) -> Size {
        Size(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced while converting decimal strings to fixed-point units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value string was empty.
    #[error("empty decimal value")]
    Empty,

    /// The value string contained a character that is not a digit or a
    /// single decimal point.
    #[error("invalid decimal value {0:?}")]
    Invalid(String),

    /// Negative values are not representable.
    #[error("negative decimal value {0:?}")]
    Negative(String),

    /// The value carries more fractional digits than the market scale.
    #[error("value {value:?} exceeds {decimals} decimal places")]
    TooPrecise {
        /// The offending value string.
        value: String,
        /// The configured number of decimal places.
        decimals: u32,
    },

    /// The value does not fit in 64-bit fixed point at this scale.
    #[error("value {0:?} overflows the fixed-point range")]
    Overflow(String),
}

/// Per-market fixed-point scale.
///
/// `price_decimals` and `size_decimals` are the number of fractional
/// decimal digits carried by one tick / one lot. A USD-quoted market with
/// cent ticks uses `price_decimals = 2`; crypto base sizes typically use
/// `size_decimals = 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notation {
    /// Fractional digits in a price tick.
    pub price_decimals: u32,
    /// Fractional digits in a size lot.
    pub size_decimals: u32,
}

impl Default for Notation {
    fn default() -> Self {
        Self {
            price_decimals: 2,
            size_decimals: 8,
        }
    }
}

impl Notation {
    /// Parse a decimal price string into tick units.
    pub fn parse_price(&self, value: &str) -> Result<Price, ValueError> {
        parse_fixed(value, self.price_decimals).map(Price)
    }

    /// Parse a decimal size string into lot units.
    pub fn parse_size(&self, value: &str) -> Result<Size, ValueError> {
        parse_fixed(value, self.size_decimals).map(Size)
    }

    /// Render a price as a decimal string with the full market scale.
    pub fn format_price(&self, price: Price) -> String {
        format_fixed(price.0, self.price_decimals)
    }

    /// Render a size as a decimal string with the full market scale.
    pub fn format_size(&self, size: Size) -> String {
        format_fixed(size.0, self.size_decimals)
    }
}

fn parse_fixed(value: &str, decimals: u32) -> Result<u64, ValueError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValueError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(ValueError::Negative(value.to_string()));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ValueError::Invalid(value.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ValueError::Invalid(value.to_string()));
    }

    // Fractional digits beyond the scale are only legal when zero.
    let (kept, excess) = if frac_part.len() > decimals as usize {
        frac_part.split_at(decimals as usize)
    } else {
        (frac_part, "")
    };
    if excess.chars().any(|c| c != '0') {
        return Err(ValueError::TooPrecise {
            value: value.to_string(),
            decimals,
        });
    }

    let scale = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| ValueError::Overflow(value.to_string()))?;
    let int_units: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| ValueError::Overflow(value.to_string()))?
    };
    let mut frac_units: u64 = if kept.is_empty() {
        0
    } else {
        kept.parse()
            .map_err(|_| ValueError::Overflow(value.to_string()))?
    };
    // Right-pad the kept fraction to the full scale.
    for _ in kept.len()..decimals as usize {
        frac_units = frac_units
            .checked_mul(10)
            .ok_or_else(|| ValueError::Overflow(value.to_string()))?;
    }

    int_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| ValueError::Overflow(value.to_string()))
}

fn format_fixed(units: u64, decimals: u32) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let scale = 10u64.pow(decimals);
    format!(
        "{}.{:0width$}",
        units / scale,
        units % scale,
        width = decimals as usize
    )
}
