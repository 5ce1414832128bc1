//! Feed boundary: typed wire messages, snapshot documents, and the
//! file-backed replay producer.

mod message;
mod replay;
mod snapshot;


pub use message::{ChannelSub, FeedError, FeedMessage, MessageKind, OrderAdd, OrderChange};
pub use replay::{FeedReplayer, ReplayStats};
pub use snapshot::{SnapshotDocument, SnapshotEntry, SnapshotPackage};
