//! Feed ingestion: the sequence reconciler, worker phase machine,
//! configuration, and shutdown signalling.

mod config;
mod sequence;
mod signal;
mod worker;


pub use config::{BuilderConfig, DisplayFlags};
pub use sequence::{SeamCheck, SequenceCheck, SequenceTracker};
pub use signal::{LivenessGuard, LivenessProbe, ShutdownSignal};
pub use worker::{BuilderHandle, BuilderReport, OrderbookBuilder, Phase, QueueStats};
