//! The ingest worker: a single-threaded phase machine that drives the
//! limit order book from the input queue.
//!
//! The worker owns the book exclusively. It cycles through five linear,
//! non-reentrant phases — Snapshot, Backfill, Websocket, Finish, Stop —
//! stitching the REST snapshot together with the live stream without
//! gaps or duplicates, and emits an aggregated depth frame after every
//! applied mutation. The output queue is never blocked on: when it is
//! full the frame is dropped, because a stale depth frame has no value
//! to the visualising consumer while a stalled ingest loop starves the
//! whole pipeline.

use super::config::BuilderConfig;
use super::sequence::{SeamCheck, SequenceCheck, SequenceTracker};
use super::signal::{LivenessProbe, ShutdownSignal};
use crate::feed::{FeedMessage, MessageKind};
use crate::orderbook::{DepthFrame, LimitOrderBook};
use crate::trades::{CandleSeries, TradeRecord, TradeTape};
use crate::utils::{IntervalGate, RunOnce, Timer};
use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Blocking input-queue read timeout. Short enough that housekeeping
/// still runs while the feed is idle.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// The queue processing phases, in order. Transitions are linear and
/// never revisit an earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Seed the book from snapshot messages; buffer live traffic.
    Snapshot,
    /// Replay the buffered live traffic in FIFO order.
    Backfill,
    /// Steady state: apply live messages, run housekeeping when idle.
    Websocket,
    /// Drain whatever is left on the input queue.
    Finish,
    /// Emit the final frame, persist, log the summary, and exit.
    Stop,
}

impl Phase {
    fn next(self) -> Phase {
        match self {
            Phase::Snapshot => Phase::Backfill,
            Phase::Backfill => Phase::Websocket,
            Phase::Websocket => Phase::Finish,
            Phase::Finish | Phase::Stop => Phase::Stop,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Snapshot => "snapshot",
            Phase::Backfill => "backfill",
            Phase::Websocket => "websocket",
            Phase::Finish => "finish",
            Phase::Stop => "stop",
        };
        write!(f, "{name}")
    }
}

/// Result of one input-queue fetch.
///
/// `Sentinel` covers both the explicit `None` end-of-input marker and a
/// fully disconnected queue (every producer dropped its sender).
enum Fetched {
    Got(FeedMessage),
    Empty,
    Sentinel,
}

/// Worker counters, forwarded as immutable copies on the stats channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Messages pulled from the input queue and handled.
    pub processed: u64,
    /// Messages skipped: stale sequence, malformed, or rejected.
    pub skipped: u64,
    /// Book mutations applied (adds, cancels, changes).
    pub mutations: u64,
    /// Depth frames placed on the output queue.
    pub frames_emitted: u64,
    /// Depth frames dropped because the output queue was full.
    pub frames_dropped: u64,
    /// Items waiting on the input queue at snapshot time.
    pub input_backlog: usize,
    /// Validity checks performed so far.
    pub lob_checks: u64,
    /// Count of sequences observed missing so far.
    pub missing_sequences: usize,
    /// Wall-clock time of this snapshot.
    pub timestamp: DateTime<Utc>,
}

/// Final state handed back when the worker exits.
#[derive(Debug)]
pub struct BuilderReport {
    /// The book in its final state.
    pub book: LimitOrderBook,
    /// Final counter values.
    pub stats: QueueStats,
    /// Every sequence observed missing, in discovery order.
    pub missing_sequences: Vec<u64>,
    /// Trades recorded on the tape.
    pub trades_recorded: usize,
    /// Candles built (sealed plus open), when candle building was on.
    pub candles_built: usize,
    /// Live messages buffered during the snapshot phase.
    pub backfill_buffered: usize,
    /// Buffered messages that carried a valid sequence and were applied.
    pub backfill_applied: usize,
}

/// Join/shutdown surface for a spawned worker.
pub struct BuilderHandle {
    thread: JoinHandle<BuilderReport>,
    signal: Arc<ShutdownSignal>,
}

impl BuilderHandle {
    /// Ask the worker to drain the input queue and stop.
    pub fn finish(&self) {
        self.signal.request_finish();
    }

    /// Ask the worker to stop immediately, skipping queued items.
    pub fn stop(&self) {
        self.signal.request_stop();
    }

    /// The shared shutdown signal, e.g. for a signal handler to latch.
    pub fn signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.signal)
    }

    /// Wait for the worker to exit and collect its report.
    ///
    /// # Errors
    /// Forwards the panic payload if the worker thread panicked.
    pub fn join(self) -> thread::Result<BuilderReport> {
        self.thread.join()
    }
}

/// Builds and maintains the limit order book from queued feed messages.
pub struct OrderbookBuilder {
    config: BuilderConfig,
    book: LimitOrderBook,
    sequences: SequenceTracker,
    phase: Phase,

    input: Receiver<Option<FeedMessage>>,
    output: Option<Sender<Option<DepthFrame>>>,
    stats_tx: Option<Sender<QueueStats>>,
    signal: Arc<ShutdownSignal>,
    liveness: Option<LivenessProbe>,

    backfill: VecDeque<FeedMessage>,
    snapshot_seen: usize,
    backfill_buffered: usize,
    backfill_applied: usize,

    tape: TradeTape,
    candles: Option<CandleSeries>,

    lob_check_gate: IntervalGate,
    save_gate: IntervalGate,
    stats_gate: IntervalGate,
    queue_empty_gate: IntervalGate,
    backfill_note: RunOnce,

    processed: u64,
    skipped: u64,
    mutations: u64,
    frames_emitted: u64,
    frames_dropped: u64,
    lob_checks: u64,
    lob_checked: bool,
    run_timer: Timer,
}

impl OrderbookBuilder {
    /// Create a worker reading from `input`. The starting phase follows
    /// the configured snapshot order count: zero skips straight to the
    /// websocket phase.
    pub fn new(config: BuilderConfig, input: Receiver<Option<FeedMessage>>) -> Self {
        let phase = if config.snapshot_order_count == 0 {
            debug!("no snapshot messages expected; starting in websocket phase");
            Phase::Websocket
        } else {
            Phase::Snapshot
        };
        let tape = TradeTape::new(
            &config.output_folder,
            &config.exchange,
            &config.market,
            config.notation,
        );
        let candles = config.build_candles.then(|| {
            CandleSeries::new(
                &config.output_folder,
                &config.exchange,
                &config.market,
                config.candle_interval(),
                config.notation,
            )
        });
        let book = LimitOrderBook::new(&config.market);
        Self {
            lob_check_gate: IntervalGate::new(config.lob_check_interval()),
            save_gate: IntervalGate::starting_closed(config.save_interval()),
            stats_gate: IntervalGate::new(config.queue_stats_interval()),
            queue_empty_gate: IntervalGate::new(config.queue_empty_interval()),
            backfill_note: RunOnce::new(),
            config,
            book,
            sequences: SequenceTracker::new(),
            phase,
            input,
            output: None,
            stats_tx: None,
            signal: ShutdownSignal::new(),
            liveness: None,
            backfill: VecDeque::new(),
            snapshot_seen: 0,
            backfill_buffered: 0,
            backfill_applied: 0,
            tape,
            candles,
            processed: 0,
            skipped: 0,
            mutations: 0,
            frames_emitted: 0,
            frames_dropped: 0,
            lob_checks: 0,
            lob_checked: true,
            run_timer: Timer::new(),
        }
    }

    /// Attach the bounded output queue for depth frames.
    pub fn with_output(mut self, output: Sender<Option<DepthFrame>>) -> Self {
        self.output = Some(output);
        self
    }

    /// Attach a stats channel receiving [`QueueStats`] copies.
    pub fn with_stats(mut self, stats: Sender<QueueStats>) -> Self {
        self.stats_tx = Some(stats);
        self
    }

    /// Attach a liveness probe; the worker stops when the matching guard
    /// is dropped.
    pub fn with_liveness(mut self, probe: LivenessProbe) -> Self {
        self.liveness = Some(probe);
        self
    }

    /// The shared shutdown signal.
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.signal)
    }

    /// Spawn the worker on its own thread.
    ///
    /// # Errors
    /// Forwards the OS error when the thread cannot be created.
    pub fn spawn(self) -> std::io::Result<BuilderHandle> {
        let signal = Arc::clone(&self.signal);
        let thread = thread::Builder::new()
            .name("orderbook-builder".to_string())
            .spawn(move || self.run())?;
        Ok(BuilderHandle { thread, signal })
    }

    /// Run the phase machine on the current thread until it stops.
    pub fn run(mut self) -> BuilderReport {
        self.run_timer.reset();
        info!(
            "orderbook builder for {} starting in {} phase ({} items queued)",
            self.config.market,
            self.phase,
            self.input.len()
        );
        loop {
            self.observe_signals();
            match self.phase {
                Phase::Snapshot => {
                    match self.fetch(RECV_TIMEOUT) {
                        Fetched::Got(message) => self.process_snapshot_item(message),
                        Fetched::Empty => {}
                        Fetched::Sentinel => self.skip_to(Phase::Finish),
                    }
                    if self.phase == Phase::Snapshot
                        && self.snapshot_seen >= self.config.snapshot_order_count
                    {
                        info!("snapshot processed ({} messages)", self.snapshot_seen);
                        self.advance();
                    }
                }
                Phase::Backfill => match self.backfill.pop_front() {
                    Some(message) => self.process_live(message, true),
                    None => {
                        info!(
                            "backfill processed: {} of {} buffered messages had a valid sequence",
                            self.backfill_applied, self.backfill_buffered
                        );
                        self.advance();
                    }
                },
                Phase::Websocket => match self.fetch(RECV_TIMEOUT) {
                    Fetched::Got(message) => {
                        self.process_live(message, false);
                        self.timed_stats();
                        self.timed_save();
                    }
                    Fetched::Empty => {
                        self.timed_queue_empty_note();
                        self.timed_lob_check();
                        self.timed_stats();
                        self.timed_save();
                    }
                    Fetched::Sentinel => {
                        debug!("input ended; draining");
                        self.advance();
                    }
                },
                Phase::Finish => match self.try_fetch() {
                    Fetched::Got(message) => self.process_live(message, false),
                    Fetched::Empty | Fetched::Sentinel => self.advance(),
                },
                Phase::Stop => return self.shutdown(),
            }
        }
    }

    /// Move to the next phase in order.
    fn advance(&mut self) {
        let next = self.phase.next();
        if next != self.phase {
            self.phase = next;
            debug!("queue processing phase set to {}", self.phase);
        }
    }

    /// Jump forward to `target`. Phases are linear and non-reentrant, so
    /// a request for an earlier phase is ignored.
    fn skip_to(&mut self, target: Phase) {
        if target > self.phase {
            self.phase = target;
            debug!("queue processing phase set to {}", self.phase);
        }
    }

    fn observe_signals(&mut self) {
        if self.signal.stop_requested() {
            self.skip_to(Phase::Stop);
            return;
        }
        if self.signal.finish_requested() {
            self.skip_to(Phase::Finish);
        }
        if let Some(probe) = &self.liveness
            && !probe.is_alive()
        {
            error!("controlling thread is gone; stopping immediately");
            self.skip_to(Phase::Stop);
        }
    }

    fn fetch(&self, timeout: Duration) -> Fetched {
        match self.input.recv_timeout(timeout) {
            Ok(Some(message)) => Fetched::Got(message),
            Ok(None) => Fetched::Sentinel,
            Err(RecvTimeoutError::Timeout) => Fetched::Empty,
            Err(RecvTimeoutError::Disconnected) => Fetched::Sentinel,
        }
    }

    fn try_fetch(&self) -> Fetched {
        match self.input.try_recv() {
            Ok(Some(message)) => Fetched::Got(message),
            Ok(None) => Fetched::Sentinel,
            Err(TryRecvError::Empty) => Fetched::Empty,
            Err(TryRecvError::Disconnected) => Fetched::Sentinel,
        }
    }

    /// Snapshot-phase handling: apply snapshot messages, buffer live
    /// traffic for the backfill phase.
    fn process_snapshot_item(&mut self, message: FeedMessage) {
        if message.kind() == MessageKind::Snapshot {
            self.processed += 1;
            self.snapshot_seen += 1;
            if let Some(sequence) = message.sequence() {
                self.sequences.observe_snapshot(sequence);
            }
            self.apply_add_message(&message, false);
        } else {
            if let Some(sequence) = message.sequence() {
                self.sequences.note_websocket(sequence);
            }
            if self.backfill_note.fire() {
                debug!("live message during snapshot load; buffering for backfill");
            }
            self.backfill_buffered += 1;
            self.backfill.push_back(message);
        }
        self.check_seam();
    }

    /// Live-phase handling shared by backfill, websocket and finish.
    fn process_live(&mut self, message: FeedMessage, backfill: bool) {
        self.processed += 1;
        let kind = message.kind();
        if kind == MessageKind::Subscriptions {
            if self.config.display.shows(kind) {
                self.display_subscription(&message);
            }
            return;
        }

        let Some(sequence) = message.sequence() else {
            info!("{kind} message without a sequence skipped");
            self.skipped += 1;
            return;
        };
        match self.sequences.observe_live(sequence) {
            SequenceCheck::Stale => {
                if backfill {
                    debug!("stale sequence {sequence} dropped during backfill");
                } else {
                    warn!(
                        "out-of-sequence {kind} message (current {:?}, got {sequence})",
                        self.sequences.current_sequence()
                    );
                }
                self.skipped += 1;
                return;
            }
            SequenceCheck::Applied => {}
        }
        if backfill {
            self.backfill_applied += 1;
        }
        self.check_seam();

        match kind {
            MessageKind::Received => {
                if self.config.display.shows(kind) {
                    info!(
                        "RECEIVED order {:?} at sequence {sequence}",
                        message.order_id()
                    );
                }
            }
            MessageKind::Open | MessageKind::Snapshot => self.apply_add_message(&message, true),
            MessageKind::Done => self.apply_done_message(&message),
            MessageKind::Change => self.apply_change_message(&message),
            MessageKind::Match => self.apply_match_message(&message),
            MessageKind::Subscriptions => {}
        }
    }

    fn apply_add_message(&mut self, message: &FeedMessage, emit: bool) {
        let add = match message.to_order_add(&self.config.notation) {
            Ok(add) => add,
            Err(err) => {
                info!("skipping malformed message: {err}");
                self.skipped += 1;
                return;
            }
        };
        if self.config.display.shows(message.kind()) {
            info!(
                "OPEN {} {} @ {} (order {})",
                add.side,
                self.config.notation.format_size(add.size),
                self.config.notation.format_price(add.price),
                add.order_id
            );
        }
        let time = add.time.unwrap_or_else(Utc::now);
        match self
            .book
            .apply_add(add.order_id, add.side, add.price, add.size, time)
        {
            Ok(()) => {
                self.mutations += 1;
                self.lob_checked = false;
                if emit {
                    self.emit_depth();
                }
            }
            Err(err) => {
                warn!("add rejected: {err}");
                self.skipped += 1;
            }
        }
    }

    fn apply_done_message(&mut self, message: &FeedMessage) {
        let Some(order_id) = message.order_id() else {
            info!("skipping malformed done message: missing order_id");
            self.skipped += 1;
            return;
        };
        if self.config.display.shows(MessageKind::Done) {
            info!("CLOSE order {order_id}");
        }
        let time = message.time().unwrap_or_else(Utc::now);
        if self.book.apply_cancel(order_id, time).is_some() {
            self.mutations += 1;
            self.lob_checked = false;
            self.emit_depth();
        }
    }

    fn apply_change_message(&mut self, message: &FeedMessage) {
        let change = match message.to_order_change(&self.config.notation) {
            Ok(change) => change,
            Err(err) => {
                info!("skipping malformed message: {err}");
                self.skipped += 1;
                return;
            }
        };
        if self.config.display.shows(MessageKind::Change) {
            info!(
                "CHANGE order {} to {}",
                change.order_id,
                self.config.notation.format_size(change.new_size)
            );
        }
        let time = change.time.unwrap_or_else(Utc::now);
        if self
            .book
            .apply_change(change.order_id, change.new_size, time)
            .is_some()
        {
            self.mutations += 1;
            self.lob_checked = false;
            self.emit_depth();
        }
    }

    fn apply_match_message(&mut self, message: &FeedMessage) {
        match TradeRecord::try_from_message(message, &self.config.notation) {
            Ok(trade) => {
                if let Some(candles) = &mut self.candles {
                    candles.update(&trade);
                }
                self.tape
                    .record(trade, self.config.display.shows(MessageKind::Match));
            }
            Err(err) => {
                info!("skipping malformed message: {err}");
                self.skipped += 1;
            }
        }
    }

    /// Emit one depth frame, dropping it when the output queue is full.
    fn emit_depth(&mut self) {
        let Some(output) = &self.output else {
            return;
        };
        let frame = DepthFrame {
            timestamp: self.book.last_timestamp().unwrap_or_else(Utc::now),
            sequence: self.sequences.current_sequence().unwrap_or(0),
            levels: self.book.aggregated_levels(None),
        };
        match output.try_send(Some(frame)) {
            Ok(()) => self.frames_emitted += 1,
            Err(TrySendError::Full(_)) => {
                self.frames_dropped += 1;
                trace!("output queue full; depth frame dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("depth consumer disconnected; disabling output");
                self.output = None;
            }
        }
    }

    fn check_seam(&mut self) {
        if self.sequences.verify_snapshot_coverage() == SeamCheck::SnapshotTooLate
            && self.config.halt_on_late_snapshot
        {
            error!("snapshot does not cover the live stream head; halting");
            self.skip_to(Phase::Stop);
        }
    }

    fn timed_lob_check(&mut self) {
        if !self.lob_check_gate.fire() || self.lob_checked {
            return;
        }
        debug!("checking orderbook validity...");
        match self.book.validate() {
            Ok(()) => debug!("orderbook passed validity checks"),
            Err(err) => warn!("orderbook validity check failed: {err}"),
        }
        self.lob_checked = true;
        self.lob_checks += 1;
    }

    fn timed_stats(&mut self) {
        if !self.stats_gate.fire() {
            return;
        }
        let stats = self.stats_snapshot();
        debug!(
            "queue stats: {} processed, {} skipped, {} mutations, backlog {}",
            stats.processed, stats.skipped, stats.mutations, stats.input_backlog
        );
        if let Some(tx) = &self.stats_tx
            && tx.try_send(stats).is_err()
        {
            debug!("stats consumer disconnected; disabling stats emission");
            self.stats_tx = None;
        }
    }

    fn timed_queue_empty_note(&mut self) {
        if self.queue_empty_gate.fire() {
            debug!("input queue empty; waiting for feed");
        }
    }

    fn timed_save(&mut self) {
        if self.save_gate.fire() {
            self.save_side_streams(false);
        }
    }

    fn save_side_streams(&mut self, final_flush: bool) {
        if final_flush && let Some(candles) = &mut self.candles {
            candles.seal();
        }
        if let Err(err) = self.tape.save_chunk() {
            warn!("failed to persist trades: {err}");
        }
        if let Some(candles) = &mut self.candles
            && let Err(err) = candles.save_chunk()
        {
            warn!("failed to persist candles: {err}");
        }
    }

    fn display_subscription(&self, message: &FeedMessage) {
        if let FeedMessage::Subscriptions { channels } = message {
            for channel in channels {
                info!(
                    "subscribed to {} '{}' channel for {}",
                    self.config.exchange,
                    channel.name,
                    channel.product_ids.join(", ")
                );
            }
        }
    }

    fn stats_snapshot(&self) -> QueueStats {
        QueueStats {
            processed: self.processed,
            skipped: self.skipped,
            mutations: self.mutations,
            frames_emitted: self.frames_emitted,
            frames_dropped: self.frames_dropped,
            input_backlog: self.input.len(),
            lob_checks: self.lob_checks,
            missing_sequences: self.sequences.missing_sequences().len(),
            timestamp: Utc::now(),
        }
    }

    fn shutdown(mut self) -> BuilderReport {
        self.emit_depth();
        if let Some(output) = &self.output
            && output.try_send(None).is_err()
        {
            debug!("output queue closed or full; consumer will observe disconnect");
        }
        self.save_side_streams(true);
        self.log_summary();

        let mut drained = 0usize;
        while self.input.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            info!("cleared {drained} unprocessed input items");
        }
        info!("orderbook builder finished");

        BuilderReport {
            stats: self.stats_snapshot(),
            missing_sequences: self.sequences.missing_sequences().to_vec(),
            trades_recorded: self.tape.len(),
            candles_built: self.candles.as_ref().map_or(0, |c| c.len()),
            backfill_buffered: self.backfill_buffered,
            backfill_applied: self.backfill_applied,
            book: self.book,
        }
    }

    fn log_summary(&self) {
        info!("________________________ summary ________________________");
        self.book.log_summary();
        info!(
            "{} items processed from queue, {} skipped, {} applied to book",
            self.processed, self.skipped, self.mutations
        );
        info!(
            "{} depth frames emitted, {} dropped",
            self.frames_emitted, self.frames_dropped
        );
        info!(
            "{} trades recorded, {} candles built",
            self.tape.len(),
            self.candles.as_ref().map_or(0, |c| c.len())
        );
        let missing = self.sequences.missing_sequences();
        if !missing.is_empty() {
            warn!("{} missing sequences", missing.len());
        }
        info!(
            "{} validity checks performed; elapsed {}",
            self.lob_checks,
            Timer::format_hms(self.run_timer.elapsed())
        );
    }
}
