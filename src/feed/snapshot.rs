//! Orderbook snapshot documents and their expansion into the input queue.
//!
//! The REST snapshot arrives as one JSON document with best-first
//! `[price, size, order_id]` triples per side. The loader fans it out
//! into individual `snapshot`-tagged messages — all carrying the
//! document's sequence — so the ingest worker can seed the book through
//! the same path as live events. Documents can be persisted to and
//! reloaded from gzip files, wrapped in a checksummed package.

use super::message::{FeedError, FeedMessage};
use crate::orderbook::{OrderId, Side};
use crossbeam::channel::Sender;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Format version for persisted snapshot packages.
const SNAPSHOT_PACKAGE_VERSION: u32 = 1;

/// One resting order in a snapshot document: `[price, size, order_id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry(pub String, pub String, pub OrderId);

/// A full-book snapshot captured at a single sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// The sequence at which the book state was captured.
    pub sequence: u64,
    /// Bid orders, best (highest price) first.
    pub bids: Vec<SnapshotEntry>,
    /// Ask orders, best (lowest price) first.
    pub asks: Vec<SnapshotEntry>,
}

/// Persisted wrapper around a [`SnapshotDocument`] with an integrity
/// checksum over the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPackage {
    /// Package format version.
    pub version: u32,
    /// Hex-encoded SHA-256 of the serialized document.
    pub checksum: String,
    /// The wrapped document.
    pub document: SnapshotDocument,
}

impl SnapshotDocument {
    /// Total number of orders across both sides.
    pub fn order_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Parse a document from raw JSON.
    ///
    /// # Errors
    /// [`FeedError::Json`] on malformed input, [`FeedError::EmptySnapshot`]
    /// when neither side holds an order.
    pub fn from_json(raw: &str) -> Result<Self, FeedError> {
        let document: SnapshotDocument = serde_json::from_str(raw)?;
        if document.order_count() == 0 {
            return Err(FeedError::EmptySnapshot);
        }
        Ok(document)
    }

    /// Load a checksummed package from a gzip file.
    ///
    /// # Errors
    /// I/O and JSON failures, plus [`FeedError::ChecksumMismatch`] when
    /// the stored digest does not match the document.
    pub fn read_gzip(path: &Path) -> Result<Self, FeedError> {
        debug!("loading orderbook snapshot from {}", path.display());
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(file);
        let mut raw = String::new();
        decoder.read_to_string(&mut raw)?;

        let package: SnapshotPackage = serde_json::from_str(&raw)?;
        let computed = compute_checksum(&package.document)?;
        if computed != package.checksum {
            return Err(FeedError::ChecksumMismatch {
                expected: package.checksum,
                actual: computed,
            });
        }
        if package.document.order_count() == 0 {
            return Err(FeedError::EmptySnapshot);
        }
        Ok(package.document)
    }

    /// Persist the document to a gzip file as a checksummed package.
    ///
    /// # Errors
    /// Serialization or I/O failure.
    pub fn write_gzip(&self, path: &Path) -> Result<(), FeedError> {
        let checksum = compute_checksum(self)?;
        let package = SnapshotPackage {
            version: SNAPSHOT_PACKAGE_VERSION,
            checksum,
            document: self.clone(),
        };
        let payload = serde_json::to_vec(&package)?;
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&payload)?;
        encoder.finish()?;
        debug!(
            "snapshot at sequence {} saved to {} ({} orders, checksum {})",
            self.sequence,
            path.display(),
            self.order_count(),
            package.checksum
        );
        Ok(())
    }

    /// Expand the document into `snapshot`-tagged messages on the input
    /// queue, bids first, best-first within each side. `depth` caps the
    /// orders taken per side, dropping the levels furthest from the top
    /// of the book. Returns the number of messages queued, which drives
    /// the worker's snapshot phase.
    pub fn load_into_queue(
        &self,
        queue: &Sender<Option<FeedMessage>>,
        depth: Option<usize>,
    ) -> usize {
        let cap = depth.unwrap_or(usize::MAX);
        if cap < self.bids.len() || cap < self.asks.len() {
            debug!(
                "snapshot depth cap {cap}: ignoring {} bids and {} asks",
                self.bids.len().saturating_sub(cap),
                self.asks.len().saturating_sub(cap)
            );
        }

        let mut queued = 0usize;
        let sides = [(Side::Buy, &self.bids), (Side::Sell, &self.asks)];
        for (side, entries) in sides {
            for entry in entries.iter().take(cap) {
                let message = FeedMessage::Snapshot {
                    sequence: Some(self.sequence),
                    order_id: Some(entry.2),
                    side: Some(side),
                    price: Some(entry.0.clone()),
                    remaining_size: Some(entry.1.clone()),
                };
                if queue.send(Some(message)).is_err() {
                    warn!("input queue closed while loading snapshot; stopping at {queued} orders");
                    return queued;
                }
                queued += 1;
            }
        }
        debug!(
            "loaded snapshot of {queued} orders at sequence {} into queue",
            self.sequence
        );
        queued
    }
}

fn compute_checksum(document: &SnapshotDocument) -> Result<String, FeedError> {
    let payload = serde_json::to_vec(document)?;
    let mut hasher = Sha256::new();
    hasher.update(payload);
    Ok(format!("{:x}", hasher.finalize()))
}
