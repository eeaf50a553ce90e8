// src/store.rs
// Lock-free consolidated book state: one writer applies L2 updates, any
// number of readers take snapshots. All storage is preallocated; the hot
// path never allocates.
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::types::{MarketDataL2Message, Price, PriceLevel, SecurityId};

pub const MAX_SECURITIES: usize = 256;

// Slot occupancy states. CLAIMED covers the window between winning the
// claim CAS and the release publication of ACTIVE; readers match only
// ACTIVE, so a half-initialized slot is never observable.
const SLOT_FREE: u8 = 0;
const SLOT_CLAIMED: u8 = 1;
const SLOT_ACTIVE: u8 = 2;

struct AtomicLevel {
    price: AtomicU64,
    quantity: AtomicU64,
}

impl AtomicLevel {
    fn new() -> Self {
        Self {
            price: AtomicU64::new(0),
            quantity: AtomicU64::new(0),
        }
    }
}

struct BookSide {
    num_levels: AtomicU8,
    levels: [AtomicLevel; 5],
}

impl BookSide {
    fn new() -> Self {
        Self {
            num_levels: AtomicU8::new(0),
            levels: std::array::from_fn(|_| AtomicLevel::new()),
        }
    }

    // Writer only. Level words go in first, then `num_levels` publishes
    // them with release; entries past the copied count are zeroed so stale
    // depth never leaks into a snapshot.
    fn store_levels(&self, levels: &[PriceLevel; 5], num_levels: u8) {
        let copy_count = num_levels.min(5);
        for (i, slot) in self.levels.iter().enumerate() {
            if i < copy_count as usize {
                slot.price.store(levels[i].price.raw(), Ordering::Relaxed);
                slot.quantity.store(levels[i].quantity, Ordering::Relaxed);
            } else {
                slot.price.store(0, Ordering::Relaxed);
                slot.quantity.store(0, Ordering::Relaxed);
            }
        }
        self.num_levels.store(copy_count, Ordering::Release);
    }

    // Acquire on `num_levels` pairs with the writer's release: every level
    // entry below the observed count was written before it.
    fn load_levels(&self, out: &mut [PriceLevel; 5]) -> u8 {
        let num_levels = self.num_levels.load(Ordering::Acquire);
        for (i, slot) in self.levels.iter().enumerate() {
            out[i] = PriceLevel {
                price: Price::from_raw(slot.price.load(Ordering::Relaxed)),
                quantity: slot.quantity.load(Ordering::Relaxed),
            };
        }
        num_levels
    }
}

#[repr(align(64))]
struct SecurityData {
    state: AtomicU8,
    id_bits: AtomicU64,
    best_bid: AtomicU64,
    best_ask: AtomicU64,
    last_trade_price: AtomicU64,
    last_update_ns: AtomicU64,
    update_count: AtomicU64,
    total_volume: AtomicU64,
    bids: BookSide,
    asks: BookSide,
}

impl SecurityData {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SLOT_FREE),
            id_bits: AtomicU64::new(0),
            best_bid: AtomicU64::new(0),
            best_ask: AtomicU64::new(0),
            last_trade_price: AtomicU64::new(0),
            last_update_ns: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            bids: BookSide::new(),
            asks: BookSide::new(),
        }
    }

    // Called by the claim winner only; the ACTIVE store publishes every
    // field written here.
    fn initialize(&self, id: SecurityId) {
        self.id_bits.store(id.to_bits(), Ordering::Relaxed);
        self.best_bid.store(0, Ordering::Relaxed);
        self.best_ask.store(0, Ordering::Relaxed);
        self.last_trade_price.store(0, Ordering::Relaxed);
        self.last_update_ns.store(0, Ordering::Relaxed);
        self.update_count.store(0, Ordering::Relaxed);
        self.total_volume.store(0, Ordering::Relaxed);
        self.bids.num_levels.store(0, Ordering::Relaxed);
        self.asks.num_levels.store(0, Ordering::Relaxed);
        self.state.store(SLOT_ACTIVE, Ordering::Release);
    }

    fn deactivate(&self) {
        self.state.store(SLOT_FREE, Ordering::Release);
    }

    fn matches(&self, id_bits: u64) -> bool {
        self.state.load(Ordering::Acquire) == SLOT_ACTIVE
            && self.id_bits.load(Ordering::Relaxed) == id_bits
    }
}

/// Full copy of a store slot at an instant.
///
/// Each side is self-consistent (levels below `num_*_levels` were written
/// before the count was published); across sides and against the best
/// bid/ask a reader may see a mix of adjacent updates, which is acceptable
/// for a last-write-wins view.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecuritySnapshot {
    pub security_id: SecurityId,
    pub best_bid: Price,
    pub best_ask: Price,
    pub last_trade_price: Price,
    pub last_update_ns: u64,
    pub num_bid_levels: u8,
    pub num_ask_levels: u8,
    pub bids: [PriceLevel; 5],
    pub asks: [PriceLevel; 5],
    pub update_count: u64,
    pub total_volume: u64,
}

impl SecuritySnapshot {
    /// Mean of best bid and ask; falls back to the last trade price when
    /// either side is unknown.
    pub fn mid_price(&self) -> Price {
        if self.best_bid.is_zero() || self.best_ask.is_zero() {
            return self.last_trade_price;
        }
        (self.best_bid + self.best_ask) / 2
    }

    /// Spread in basis points of the mid, 0.0 when either side is unknown.
    pub fn spread_bps(&self) -> f64 {
        if self.best_bid.is_zero() || self.best_ask.is_zero() {
            return 0.0;
        }
        let mid = self.mid_price();
        if mid.is_zero() {
            return 0.0;
        }
        (self.best_ask - self.best_bid).dollars() / mid.dollars() * 10_000.0
    }
}

/// Fixed-capacity slot table of per-security book state.
///
/// Single writer (`update_from_l2`), any number of concurrent readers.
/// `add_security` and `remove_security` may run from any thread; the
/// per-slot claim CAS serializes concurrent claims.
pub struct SecurityStore {
    slots: Box<[SecurityData]>,
    active_count: AtomicUsize,
}

impl SecurityStore {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_SECURITIES);
        slots.resize_with(MAX_SECURITIES, SecurityData::new);
        Self {
            slots: slots.into_boxed_slice(),
            active_count: AtomicUsize::new(0),
        }
    }

    fn find(&self, id_bits: u64) -> Option<&SecurityData> {
        self.slots.iter().find(|slot| slot.matches(id_bits))
    }

    /// False when the id is already present or the table is full.
    pub fn add_security(&self, id: SecurityId) -> bool {
        let id_bits = id.to_bits();
        if self.find(id_bits).is_some() {
            return false;
        }
        for slot in self.slots.iter() {
            if slot
                .state
                .compare_exchange(SLOT_FREE, SLOT_CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                slot.initialize(id);
                self.active_count.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// False when the id is not present.
    pub fn remove_security(&self, id: SecurityId) -> bool {
        match self.find(id.to_bits()) {
            Some(slot) => {
                slot.deactivate();
                self.active_count.fetch_sub(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Writer only. False when no active slot matches the message id.
    pub fn update_from_l2(&self, message: &MarketDataL2Message) -> bool {
        let Some(slot) = self.find(message.security_id.to_bits()) else {
            return false;
        };

        slot.last_update_ns
            .store(message.timestamp_ns, Ordering::Release);

        if message.num_bid_levels > 0 {
            slot.best_bid
                .store(message.bids[0].price.raw(), Ordering::Relaxed);
        }
        if message.num_ask_levels > 0 {
            slot.best_ask
                .store(message.asks[0].price.raw(), Ordering::Relaxed);
        }

        slot.bids.store_levels(&message.bids, message.num_bid_levels);
        slot.asks.store_levels(&message.asks, message.num_ask_levels);
        slot.update_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn get_security_snapshot(&self, id: SecurityId) -> Option<SecuritySnapshot> {
        let slot = self.find(id.to_bits())?;

        let mut snapshot = SecuritySnapshot {
            security_id: SecurityId::from_bits(slot.id_bits.load(Ordering::Relaxed)),
            last_update_ns: slot.last_update_ns.load(Ordering::Acquire),
            best_bid: Price::from_raw(slot.best_bid.load(Ordering::Relaxed)),
            best_ask: Price::from_raw(slot.best_ask.load(Ordering::Relaxed)),
            last_trade_price: Price::from_raw(slot.last_trade_price.load(Ordering::Relaxed)),
            update_count: slot.update_count.load(Ordering::Relaxed),
            total_volume: slot.total_volume.load(Ordering::Relaxed),
            ..Default::default()
        };
        snapshot.num_bid_levels = slot.bids.load_levels(&mut snapshot.bids);
        snapshot.num_ask_levels = slot.asks.load_levels(&mut snapshot.asks);
        Some(snapshot)
    }

    /// Ids of all currently active slots. Allocates; not a hot-path call.
    pub fn get_all_securities(&self) -> Vec<SecurityId> {
        let mut result = Vec::with_capacity(self.size());
        for slot in self.slots.iter() {
            if slot.state.load(Ordering::Acquire) == SLOT_ACTIVE {
                result.push(SecurityId::from_bits(slot.id_bits.load(Ordering::Relaxed)));
            }
        }
        result
    }

    pub fn size(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    pub fn contains(&self, id: SecurityId) -> bool {
        self.find(id.to_bits()).is_some()
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.deactivate();
        }
        self.active_count.store(0, Ordering::Relaxed);
    }
}

impl Default for SecurityStore {
    fn default() -> Self {
        Self::new()
    }
}
