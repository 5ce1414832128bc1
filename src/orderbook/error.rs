//! Order book error types

use super::types::{OrderId, ValueError};
use std::fmt;

/// Errors that can occur within the limit order book.
#[derive(Debug)]
#[non_exhaustive]
pub enum BookError {
    /// `apply_add` was called with an order id that is already indexed.
    DuplicateOrder {
        /// The offending order id.
        uid: OrderId,
    },

    /// A cancel or change referenced an order id that is not indexed.
    /// Callers at the feed seam treat this as a tolerated no-op; the
    /// error form exists for strict contexts.
    UnknownOrder {
        /// The missing order id.
        uid: OrderId,
    },

    /// An order carried a zero price or size where a positive value is
    /// required.
    InvalidQuantity {
        /// The offending order id.
        uid: OrderId,
        /// Description of the rejected field.
        field: &'static str,
    },

    /// A decimal value failed fixed-point conversion.
    BadValue(ValueError),

    /// One or more structural invariants failed during validation.
    InvariantViolation {
        /// Human-readable descriptions of every violation found.
        messages: Vec<String>,
    },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::DuplicateOrder { uid } => {
                write!(f, "duplicate order id {uid}")
            }
            BookError::UnknownOrder { uid } => {
                write!(f, "unknown order id {uid}")
            }
            BookError::InvalidQuantity { uid, field } => {
                write!(f, "order {uid} rejected: {field} must be positive")
            }
            BookError::BadValue(err) => {
                write!(f, "bad decimal value: {err}")
            }
            BookError::InvariantViolation { messages } => {
                write!(f, "invariant violation: {}", messages.join("; "))
            }
        }
    }
}

impl std::error::Error for BookError {}

impl From<ValueError> for BookError {
    fn from(err: ValueError) -> Self {
        BookError::BadValue(err)
    }
}
