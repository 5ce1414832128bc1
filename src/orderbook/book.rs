//! Core limit order book: two price-level trees, the order arena, and the
//! aggregate level maps that downstream depth snapshots are cut from.

use super::arena::{NIL, OrderArena, OrderSlot};
use super::depth::DepthLevels;
use super::error::BookError;
use super::tree::{LevelInfo, LevelTree};
use super::types::{OrderId, Price, Side, Size};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// A resting order read back out of the book, e.g. by a cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RestingOrder {
    /// Feed-assigned order id.
    pub uid: OrderId,
    /// Side the order rested on.
    pub side: Side,
    /// Limit price in tick units.
    pub price: Price,
    /// Open size at removal time.
    pub size: Size,
    /// Event time of the message that created the order.
    pub timestamp: DateTime<Utc>,
}

impl From<OrderSlot> for RestingOrder {
    fn from(slot: OrderSlot) -> Self {
        Self {
            uid: slot.uid,
            side: slot.side,
            price: slot.price,
            size: slot.size,
            timestamp: slot.timestamp,
        }
    }
}

/// The outcome of an in-place size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeChange {
    /// Price level the order rests on.
    pub price: Price,
    /// Size before the change.
    pub old_size: Size,
    /// Size after the change.
    pub new_size: Size,
}

/// A passive replica of one instrument's limit order book.
///
/// The book applies the exchange's order-by-order stream; it never
/// matches. One worker thread owns the book exclusively (the ingest
/// pipeline serialises all access), so reads taken between mutations see
/// a consistent state by construction.
#[derive(Debug)]
pub struct LimitOrderBook {
    /// The market this book replicates, e.g. `BTC-USD`.
    market: String,

    /// Bid-side price levels, keyed by price, iterated best-first in
    /// descending order.
    bids: LevelTree,

    /// Ask-side price levels, keyed by price, iterated best-first in
    /// ascending order.
    asks: LevelTree,

    /// Slot storage for every resting order on either side.
    orders: OrderArena,

    /// Order id → arena slot. The secondary index that makes cancellation
    /// by id O(log P) overall (hash lookup + tree maintenance).
    order_index: HashMap<OrderId, u32>,

    /// Mirror of the bid tree as `price → total size`. Kept in lockstep
    /// with the tree so depth snapshots are O(depth) instead of a full
    /// tree walk, and so validation can cross-check the two structures.
    bid_levels: BTreeMap<Price, Size>,

    /// Mirror of the ask tree, same contract as `bid_levels`.
    ask_levels: BTreeMap<Price, Size>,

    /// Event time of the most recent applied mutation.
    last_timestamp: Option<DateTime<Utc>>,

    /// Count of applied mutations (adds, cancels and changes).
    items_processed: u64,
}

impl LimitOrderBook {
    /// Create an empty book for `market`.
    pub fn new(market: &str) -> Self {
        Self {
            market: market.to_string(),
            bids: LevelTree::new(),
            asks: LevelTree::new(),
            orders: OrderArena::new(),
            order_index: HashMap::new(),
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
            last_timestamp: None,
            items_processed: 0,
        }
    }

    /// The market identifier this book replicates.
    pub fn market(&self) -> &str {
        &self.market
    }

    /// `true` when neither side holds a level.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Number of resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Count of applied mutations.
    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    /// Event time of the most recent applied mutation.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// The bid-side level tree.
    pub fn bids(&self) -> &LevelTree {
        &self.bids
    }

    /// The ask-side level tree.
    pub fn asks(&self) -> &LevelTree {
        &self.asks
    }

    /// Insert a new resting order.
    ///
    /// # Errors
    /// [`BookError::DuplicateOrder`] when `uid` is already indexed,
    /// [`BookError::InvalidQuantity`] when price or size is zero. The
    /// book is unchanged on error.
    pub fn apply_add(
        &mut self,
        uid: OrderId,
        side: Side,
        price: Price,
        size: Size,
        timestamp: DateTime<Utc>,
    ) -> Result<(), BookError> {
        if self.order_index.contains_key(&uid) {
            return Err(BookError::DuplicateOrder { uid });
        }
        if price.is_zero() {
            return Err(BookError::InvalidQuantity { uid, field: "price" });
        }
        if size.is_zero() {
            return Err(BookError::InvalidQuantity { uid, field: "size" });
        }
        trace!("adding order {uid} {side} {size} @ {price}");

        let slot = OrderSlot {
            uid,
            side,
            price,
            size,
            timestamp,
            level: NIL,
            prev: NIL,
            next: NIL,
        };
        let order = self.orders.insert(slot);
        let tree = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = tree.upsert(price);
        tree.push_back_order(level, order, &mut self.orders);
        self.order_index.insert(uid, order);

        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        let entry = levels.entry(price).or_insert(Size::ZERO);
        *entry = entry.saturating_add(size);

        self.touch(timestamp);
        Ok(())
    }

    /// Remove a resting order by id.
    ///
    /// Unknown ids are a tolerated no-op: the snapshot is a prefix of the
    /// stream, so cancels for orders that predate it are expected at the
    /// snapshot/websocket seam.
    pub fn apply_cancel(
        &mut self,
        uid: OrderId,
        timestamp: DateTime<Utc>,
    ) -> Option<RestingOrder> {
        let Some(order) = self.order_index.remove(&uid) else {
            debug!("cancel for unindexed order id {uid}");
            return None;
        };
        let slot = *self.orders.get(order);
        trace!("removing order {uid} from {} @ {}", slot.side, slot.price);

        let tree = match slot.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = slot.level;
        tree.unlink_order(order, &mut self.orders);

        let levels = match slot.side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        if tree.order_count(level) == 0 {
            tree.remove(level);
            levels.remove(&slot.price);
        } else if let Some(entry) = levels.get_mut(&slot.price) {
            *entry = entry.saturating_sub(slot.size);
        }

        let removed = self.orders.release(order);
        self.touch(timestamp);
        Some(removed.into())
    }

    /// Change a resting order's open size in place.
    ///
    /// The level and aggregate totals absorb the `old − new` delta. A
    /// zero `new_size` is equivalent to a cancel. Unknown ids are a
    /// tolerated no-op.
    pub fn apply_change(
        &mut self,
        uid: OrderId,
        new_size: Size,
        timestamp: DateTime<Utc>,
    ) -> Option<SizeChange> {
        if new_size.is_zero() {
            return self.apply_cancel(uid, timestamp).map(|removed| SizeChange {
                price: removed.price,
                old_size: removed.size,
                new_size: Size::ZERO,
            });
        }
        let Some(&order) = self.order_index.get(&uid) else {
            debug!("change for unindexed order id {uid}");
            return None;
        };
        let (side, price, level, old_size) = {
            let slot = self.orders.get_mut(order);
            let old = slot.size;
            slot.size = new_size;
            (slot.side, slot.price, slot.level, old)
        };
        trace!("changing order {uid} size {old_size} -> {new_size}");

        let tree = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        tree.adjust_level_size(level, old_size, new_size);

        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        if let Some(entry) = levels.get_mut(&price) {
            *entry = entry.saturating_sub(old_size).saturating_add(new_size);
        }

        self.touch(timestamp);
        Some(SizeChange {
            price,
            old_size,
            new_size,
        })
    }

    /// The highest bid price, if any.
    pub fn best_bid(&self) -> Option<Price> {
        self.bid_levels.last_key_value().map(|(price, _)| *price)
    }

    /// The lowest ask price, if any.
    pub fn best_ask(&self) -> Option<Price> {
        self.ask_levels.first_key_value().map(|(price, _)| *price)
    }

    /// Best bid and best ask together.
    pub fn top_of_book(&self) -> (Option<Price>, Option<Price>) {
        (self.best_bid(), self.best_ask())
    }

    /// Open size of the order with `uid`, if it rests in the book.
    pub fn order_size(&self, uid: &OrderId) -> Option<Size> {
        self.order_index
            .get(uid)
            .map(|&order| self.orders.get(order).size)
    }

    /// Head of the time-priority queue at `price` on `side`.
    pub fn front_order(&self, side: Side, price: Price) -> Option<RestingOrder> {
        let tree = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let level = tree.find(price)?;
        tree.front_order(level)
            .map(|order| (*self.orders.get(order)).into())
    }

    /// Remove and return the head of the queue at `price` on `side`.
    ///
    /// The replica never pops through matching (consumed liquidity
    /// arrives as `change`/`done` events), but simulations walking the
    /// book want the operation. Equivalent to cancelling the head order.
    pub fn pop_front(
        &mut self,
        side: Side,
        price: Price,
        timestamp: DateTime<Utc>,
    ) -> Option<RestingOrder> {
        let uid = self.front_order(side, price)?.uid;
        self.apply_cancel(uid, timestamp)
    }

    /// Time-priority order of resting uids at `price` on `side`.
    pub fn queue_at(&self, side: Side, price: Price) -> Vec<OrderId> {
        let tree = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let mut uids = Vec::new();
        if let Some(level) = tree.find(price) {
            let mut cur = tree.front_order(level);
            while let Some(order) = cur {
                let slot = self.orders.get(order);
                uids.push(slot.uid);
                cur = if slot.next == NIL { None } else { Some(slot.next) };
            }
        }
        uids
    }

    /// Aggregated `price → total size` projection of both sides, bids in
    /// descending and asks in ascending price order. `depth` caps the
    /// number of levels taken per side. The result is a deep copy and
    /// never observes later mutations.
    pub fn aggregated_levels(&self, depth: Option<usize>) -> DepthLevels {
        let cap = depth.unwrap_or(usize::MAX);
        DepthLevels {
            bids: self
                .bid_levels
                .iter()
                .rev()
                .take(cap)
                .map(|(p, s)| (*p, *s))
                .collect(),
            asks: self
                .ask_levels
                .iter()
                .take(cap)
                .map(|(p, s)| (*p, *s))
                .collect(),
        }
    }

    /// Levels of one side in price-priority order.
    pub fn side_levels(&self, side: Side) -> Vec<LevelInfo> {
        match side {
            Side::Buy => self.bids.iter_descending().collect(),
            Side::Sell => self.asks.iter_ascending().collect(),
        }
    }

    /// Run every structural invariant check.
    ///
    /// # Errors
    /// [`BookError::InvariantViolation`] carrying every violation found:
    /// tree structure and balance, FIFO/aggregate agreement per level,
    /// tree vs. aggregate-map agreement, and order-index back-pointers.
    pub fn validate(&self) -> Result<(), BookError> {
        let mut messages = self.bids.check(&self.orders);
        messages.extend(self.asks.check(&self.orders));

        self.check_against_levels(&self.bids, &self.bid_levels, "bid", &mut messages);
        self.check_against_levels(&self.asks, &self.ask_levels, "ask", &mut messages);
        self.check_order_index(&mut messages);

        if messages.is_empty() {
            Ok(())
        } else {
            Err(BookError::InvariantViolation { messages })
        }
    }

    fn check_against_levels(
        &self,
        tree: &LevelTree,
        levels: &BTreeMap<Price, Size>,
        label: &str,
        messages: &mut Vec<String>,
    ) {
        if tree.len() != levels.len() {
            messages.push(format!(
                "{label} tree holds {} levels but aggregate map holds {}",
                tree.len(),
                levels.len()
            ));
        }
        for (price, size) in levels {
            match tree.level(*price) {
                Some(info) if info.total_size == *size => {}
                Some(info) => messages.push(format!(
                    "{label} level {price} aggregates {size} but tree records {}",
                    info.total_size
                )),
                None => messages.push(format!(
                    "{label} level {price} missing from tree"
                )),
            }
        }
    }

    fn check_order_index(&self, messages: &mut Vec<String>) {
        let mut seen: HashMap<OrderId, u32> = HashMap::with_capacity(self.order_index.len());
        let mut walk = |tree: &LevelTree, side: Side, messages: &mut Vec<String>| {
            tree.for_each_order(&self.orders, |_, order| {
                let slot = self.orders.get(order);
                if slot.side != side {
                    messages.push(format!(
                        "order {} rests on the {side} tree but is marked {}",
                        slot.uid, slot.side
                    ));
                }
                if seen.insert(slot.uid, order).is_some() {
                    messages.push(format!("order {} linked into two FIFOs", slot.uid));
                }
            });
        };
        walk(&self.bids, Side::Buy, messages);
        walk(&self.asks, Side::Sell, messages);

        for (uid, order) in &self.order_index {
            match seen.get(uid) {
                Some(found) if found == order => {}
                Some(_) => messages.push(format!(
                    "index entry for order {uid} points at the wrong slot"
                )),
                None => messages.push(format!(
                    "indexed order {uid} is not linked into any level FIFO"
                )),
            }
        }
        if seen.len() != self.order_index.len() {
            messages.push(format!(
                "{} orders linked in FIFOs but {} indexed",
                seen.len(),
                self.order_index.len()
            ));
        }
        if self.orders.len() != self.order_index.len() {
            messages.push(format!(
                "arena holds {} live orders but index holds {}",
                self.orders.len(),
                self.order_index.len()
            ));
        }
    }

    /// Log a human-readable summary of the book's final state.
    pub fn log_summary(&self) {
        tracing::info!(
            "orderbook {}: {} bid levels, {} ask levels, {} resting orders",
            self.market,
            self.bids.len(),
            self.asks.len(),
            self.order_count()
        );
        tracing::info!(
            "bid tree height {} / ask tree height {}; items processed {}",
            self.bids.height(),
            self.asks.height(),
            self.items_processed
        );
    }

    fn touch(&mut self, timestamp: DateTime<Utc>) {
        self.last_timestamp = Some(timestamp);
        self.items_processed += 1;
    }
}
