//! Prelude module that re-exports commonly used types.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use lobfeed_rs::prelude::*;
//! ```

// Book types
pub use crate::orderbook::{
    BookError, LevelInfo, LevelShape, LevelTree, LimitOrderBook, RestingOrder, SizeChange,
};

// Market value types
pub use crate::orderbook::{Notation, OrderId, Price, Side, Size, ValueError};

// Depth output types
pub use crate::orderbook::{DepthFrame, DepthLevels, WireDepthFrame};

// Feed boundary types
pub use crate::feed::{
    FeedError, FeedMessage, FeedReplayer, MessageKind, SnapshotDocument, SnapshotEntry,
};

// Ingest worker types
pub use crate::ingest::{
    BuilderConfig, BuilderHandle, BuilderReport, DisplayFlags, LivenessGuard, OrderbookBuilder,
    Phase, QueueStats, SequenceTracker, ShutdownSignal,
};

// Trade side-stream types
pub use crate::trades::{Candle, CandleSeries, TradeRecord, TradeTape};

// Utilities
pub use crate::utils::{IntervalGate, RunOnce, Timer, current_time_millis};
