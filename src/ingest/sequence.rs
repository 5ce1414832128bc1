//! Sequence reconciliation state.
//!
//! Every feed message carries a monotonically increasing sequence number
//! assigned by the exchange; the tracker enforces strict monotonicity
//! outside the snapshot phase, records gaps exactly once (the feed never
//! rewinds, so gaps are recorded rather than repaired), and checks that
//! the snapshot actually covers the head of the live stream.

use tracing::{debug, warn};

/// Verdict for a live-stream sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// The sequence advanced; apply the message.
    Applied,
    /// At or behind the current sequence; skip the message.
    Stale,
}

/// Outcome of the snapshot/websocket seam verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeamCheck {
    /// Not enough anchors known yet.
    Pending,
    /// The snapshot covers the head of the live stream.
    Covered,
    /// The snapshot sequence is past the first live sequence by more
    /// than one: it was fetched too late and the seam has a hole.
    SnapshotTooLate,
}

/// State of the snapshot/live-stream reconciliation.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    first_sequence: Option<u64>,
    snapshot_sequence: Option<u64>,
    first_websocket_sequence: Option<u64>,
    prev_sequence: Option<u64>,
    current_sequence: Option<u64>,
    missing: Vec<u64>,
    seam_verified: bool,
}

impl SequenceTracker {
    /// Create a tracker with no sequences observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first sequence observed from any source.
    pub fn first_sequence(&self) -> Option<u64> {
        self.first_sequence
    }

    /// The sequence the snapshot was captured at.
    pub fn snapshot_sequence(&self) -> Option<u64> {
        self.snapshot_sequence
    }

    /// The first sequence observed from the live stream.
    pub fn first_websocket_sequence(&self) -> Option<u64> {
        self.first_websocket_sequence
    }

    /// The sequence of the most recently applied message.
    pub fn current_sequence(&self) -> Option<u64> {
        self.current_sequence
    }

    /// The sequence applied before the current one.
    pub fn prev_sequence(&self) -> Option<u64> {
        self.prev_sequence
    }

    /// Every sequence number observed missing, in ascending order of
    /// discovery.
    pub fn missing_sequences(&self) -> &[u64] {
        &self.missing
    }

    /// Record a snapshot message. All messages of one snapshot share the
    /// document sequence, so monotonicity is not enforced here and no
    /// gaps are recorded.
    pub fn observe_snapshot(&mut self, sequence: u64) {
        self.note_first(sequence);
        if self.snapshot_sequence.is_none() {
            self.snapshot_sequence = Some(sequence);
            debug!("snapshot sequence = {sequence}");
        }
        if self.current_sequence.is_none_or(|current| sequence > current) {
            self.prev_sequence = self.current_sequence;
            self.current_sequence = Some(sequence);
        }
    }

    /// Note the sequence of a live message seen before it is applied
    /// (e.g. while it waits in the backfill buffer). Anchors the
    /// first-websocket marker without advancing the current sequence.
    pub fn note_websocket(&mut self, sequence: u64) {
        self.note_first(sequence);
        if self.first_websocket_sequence.is_none() {
            self.first_websocket_sequence = Some(sequence);
            debug!("first websocket sequence = {sequence}");
        }
    }

    /// Validate and record a live-stream sequence. A message is valid
    /// iff its sequence is strictly greater than the current one; a jump
    /// of more than one records the skipped range as missing.
    pub fn observe_live(&mut self, sequence: u64) -> SequenceCheck {
        self.note_websocket(sequence);
        if self.current_sequence.is_some_and(|current| sequence <= current) {
            return SequenceCheck::Stale;
        }
        self.prev_sequence = self.current_sequence;
        self.current_sequence = Some(sequence);
        if let Some(prev) = self.prev_sequence
            && sequence > prev + 1
        {
            let gap = (prev + 1)..sequence;
            warn!(
                "missing {} sequences: [{}, {})",
                gap.end - gap.start,
                gap.start,
                gap.end
            );
            self.missing.extend(gap);
        }
        SequenceCheck::Applied
    }

    /// Verify the snapshot/websocket seam once both anchors are known.
    ///
    /// The snapshot must not start past the head of the live stream:
    /// `snapshot_sequence ≤ first_websocket_sequence + 1`. A later
    /// snapshot means events between the stream head and the snapshot
    /// were never delivered to either path. Returns the verdict exactly
    /// once; later calls report `Pending` until both anchors exist and
    /// `Covered` after the first verification.
    pub fn verify_snapshot_coverage(&mut self) -> SeamCheck {
        if self.seam_verified {
            return SeamCheck::Covered;
        }
        let (Some(snapshot), Some(first_ws)) =
            (self.snapshot_sequence, self.first_websocket_sequence)
        else {
            return SeamCheck::Pending;
        };
        self.seam_verified = true;
        if snapshot > first_ws + 1 {
            warn!(
                "snapshot sequence {snapshot} is past the first websocket sequence {first_ws}: \
                 snapshot was fetched too late and the seam may have holes"
            );
            SeamCheck::SnapshotTooLate
        } else {
            debug!(
                "snapshot sequence {snapshot} covers the websocket head {first_ws}"
            );
            SeamCheck::Covered
        }
    }

    fn note_first(&mut self, sequence: u64) {
        if self.first_sequence.is_none() {
            self.first_sequence = Some(sequence);
            debug!("first sequence = {sequence}");
        }
    }
}
