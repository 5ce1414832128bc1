//! Limit order book engine: arena-backed AVL price levels, the order
//! index, and the aggregated depth projection.

mod arena;
mod book;
mod depth;
mod error;
mod tree;
mod types;

mod tests;

pub use book::{LimitOrderBook, RestingOrder, SizeChange};
pub use depth::{DepthFrame, DepthLevels, WireDepthFrame};
pub use error::BookError;
pub use tree::{LevelInfo, LevelIter, LevelShape, LevelTree};
pub use types::{Notation, OrderId, Price, Side, Size, ValueError};
