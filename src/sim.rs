// src/sim.rs
// Synthetic L2 source: deterministic per-symbol base prices, bounded random
// walk, five levels per side, optional activity spikes for stress runs.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Deserialize;

use crate::seeder;
use crate::source::{MarketDataCallback, MarketDataSource};
use crate::types::{msg_type, MarketDataL2Message, Price, SecurityId};
use crate::util::now_nanos;
use zerocopy::FromZeroes;

pub const MAX_SECURITIES: usize = 256;

const SLOT_FREE: u8 = 0;
const SLOT_CLAIMED: u8 = 1;
const SLOT_ACTIVE: u8 = 2;

// Same LCG the level spacing and quantity draws have always used.
const LCG_MUL: u64 = 1103515245;
const LCG_INC: u64 = 12345;

#[inline]
fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
    *state
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fallback base price for symbols without a preset.
    pub base_price: f64,
    /// Retained for config compatibility; the reduced walk does not use it.
    pub volatility: f64,
    /// Target bid/ask spread in basis points of the mid.
    pub spread_bps: f64,
    /// Target period between generation passes.
    pub update_interval_us: u32,
    /// Messages per active security per pass.
    pub messages_per_burst: u32,
    pub min_quantity: u32,
    pub max_quantity: u32,
    /// Stochastic burst mode for stress testing.
    pub enable_activity_spikes: bool,
    /// Per-pass percent chance (0-100) of entering a spike.
    pub spike_probability: u32,
    /// Multiplies messages_per_burst while a spike is active.
    pub spike_multiplier: u32,
    pub spike_duration_us: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            base_price: 150.0,
            volatility: 0.02,
            spread_bps: 2.0,
            update_interval_us: 10,
            messages_per_burst: 5,
            min_quantity: 100,
            max_quantity: 1000,
            enable_activity_spikes: false,
            spike_probability: 5,
            spike_multiplier: 10,
            spike_duration_us: 1000,
        }
    }
}

#[repr(align(64))]
struct SimSlot {
    state: AtomicU8,
    id_bits: AtomicU64,
    /// f64 bits of the walking price; generator-owned once active.
    price_bits: AtomicU64,
    /// Per-slot LCG state, seeded from the id at activation.
    rng_state: AtomicU64,
}

impl SimSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SLOT_FREE),
            id_bits: AtomicU64::new(0),
            price_bits: AtomicU64::new(0),
            rng_state: AtomicU64::new(0),
        }
    }

    fn initialize(&self, id: SecurityId, base_price: f64) {
        self.id_bits.store(id.to_bits(), Ordering::Relaxed);
        self.price_bits.store(base_price.to_bits(), Ordering::Relaxed);
        self.rng_state.store(seed_from_id(id), Ordering::Relaxed);
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

// XOR-fold the symbol bytes so the walk is reproducible per symbol.
fn seed_from_id(id: SecurityId) -> u64 {
    let mut seed: u32 = 0;
    for (i, &byte) in id.as_bytes().iter().enumerate() {
        seed ^= (byte as u32) << (i % 4 * 8);
    }
    seed as u64
}

struct Inner {
    config: SimConfig,
    running: AtomicBool,
    callback: Mutex<Option<MarketDataCallback>>,
    slots: Box<[SimSlot]>,
    active_count: AtomicUsize,
    seq_no: AtomicU32,
}

/// Simulated market data source.
pub struct SimSource {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SimSource {
    pub fn new(config: SimConfig) -> Self {
        let mut slots = Vec::with_capacity(MAX_SECURITIES);
        slots.resize_with(MAX_SECURITIES, SimSlot::new);
        Self {
            inner: Arc::new(Inner {
                config,
                running: AtomicBool::new(false),
                callback: Mutex::new(None),
                slots: slots.into_boxed_slice(),
                active_count: AtomicUsize::new(0),
                seq_no: AtomicU32::new(0),
            }),
            thread: Mutex::new(None),
        }
    }

    fn find(&self, id_bits: u64) -> Option<&SimSlot> {
        self.inner.slots.iter().find(|slot| slot.matches(id_bits))
    }
}

impl MarketDataSource for SimSource {
    fn start(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let inner = self.inner.clone();
        match thread::Builder::new()
            .name("sim-source".into())
            .spawn(move || generator_loop(inner))
        {
            Ok(handle) => {
                *self.thread.lock().unwrap() = Some(handle);
                info!("sim source started");
                true
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::Release);
                warn!("failed to spawn sim source thread: {e}");
                false
            }
        }
    }

    fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("sim source stopped");
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    fn subscribe(&self, id: SecurityId) -> bool {
        let id_bits = id.to_bits();
        if self.find(id_bits).is_some() {
            return false;
        }
        for slot in self.inner.slots.iter() {
            if slot
                .state
                .compare_exchange(SLOT_FREE, SLOT_CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                let base = seeder::base_price(id.as_str(), self.inner.config.base_price);
                slot.initialize(id, base);
                self.inner.active_count.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    fn unsubscribe(&self, id: SecurityId) -> bool {
        match self.find(id.to_bits()) {
            Some(slot) => {
                slot.deactivate();
                self.inner.active_count.fetch_sub(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn set_callback(&self, callback: MarketDataCallback) {
        *self.inner.callback.lock().unwrap() = Some(callback);
    }

    /// Advisory: an id deactivated while the scan runs may still appear.
    fn subscribed_securities(&self) -> Vec<SecurityId> {
        let mut result = Vec::with_capacity(self.inner.active_count.load(Ordering::Relaxed));
        for slot in self.inner.slots.iter() {
            if slot.state.load(Ordering::Acquire) == SLOT_ACTIVE {
                result.push(SecurityId::from_bits(slot.id_bits.load(Ordering::Relaxed)));
            }
        }
        result
    }
}

impl Drop for SimSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn generator_loop(inner: Arc<Inner>) {
    let callback = inner.callback.lock().unwrap().clone();
    let config = inner.config.clone();

    let mut spike_rng: u64 = 12345;
    let mut qty_rng: u64 = 42;
    let mut level_rng: u64 = 123;
    let mut in_spike = false;
    let mut spike_end = Instant::now();

    while inner.running.load(Ordering::Acquire) {
        let pass_start = Instant::now();

        let mut burst_multiplier = 1u32;
        if config.enable_activity_spikes {
            if !in_spike {
                if lcg_next(&mut spike_rng) % 100 < config.spike_probability as u64 {
                    in_spike = true;
                    burst_multiplier = config.spike_multiplier;
                    spike_end =
                        pass_start + Duration::from_micros(config.spike_duration_us as u64);
                }
            } else if pass_start >= spike_end {
                in_spike = false;
            } else {
                burst_multiplier = config.spike_multiplier;
            }
        }

        if let Some(ref callback) = callback {
            for slot in inner.slots.iter() {
                if slot.state.load(Ordering::Acquire) != SLOT_ACTIVE {
                    continue;
                }
                let total = config.messages_per_burst * burst_multiplier;
                for _ in 0..total {
                    let message =
                        build_message(&inner, &config, slot, &mut qty_rng, &mut level_rng);
                    callback(&message);
                }
            }
        }

        // Higher frequency while a spike is active.
        let effective_interval_us = if in_spike {
            config.update_interval_us / 2
        } else {
            config.update_interval_us
        };
        let target = Duration::from_micros(effective_interval_us as u64);
        let elapsed = pass_start.elapsed();
        if target > elapsed {
            thread::sleep(target - elapsed);
        }
    }
}

fn build_message(
    inner: &Inner,
    config: &SimConfig,
    slot: &SimSlot,
    qty_rng: &mut u64,
    level_rng: &mut u64,
) -> MarketDataL2Message {
    // Bounded drift of +-0.05% per message, clamped to a dollar floor.
    let mut rng = slot.rng_state.load(Ordering::Relaxed);
    let draw = lcg_next(&mut rng);
    slot.rng_state.store(rng, Ordering::Relaxed);
    let drift = ((draw & 0xFFFF) as f64 / 65535.0 - 0.5) * 0.001;

    let mut price = f64::from_bits(slot.price_bits.load(Ordering::Relaxed));
    price *= 1.0 + drift;
    if price < 1.0 {
        price = 1.0;
    }
    slot.price_bits.store(price.to_bits(), Ordering::Relaxed);

    let mut message = MarketDataL2Message::new_zeroed();
    message.header.seq_no = inner.seq_no.fetch_add(1, Ordering::Relaxed);
    message.header.length = std::mem::size_of::<MarketDataL2Message>() as u16;
    message.header.msg_type = msg_type::MARKET_DATA_L2;
    message.security_id = SecurityId::from_bits(slot.id_bits.load(Ordering::Relaxed));
    message.timestamp_ns = now_nanos();

    let spread = price * (config.spread_bps / 10_000.0);
    let quantity_span = (config.max_quantity.saturating_sub(config.min_quantity)).max(1) as u64;

    message.num_bid_levels = 5;
    let mut bid = price - spread / 2.0;
    for level in message.bids.iter_mut() {
        level.price = Price::from_dollars(bid);
        level.quantity = config.min_quantity as u64 + lcg_next(qty_rng) % quantity_span;
        // Levels 1 to 5 basis points apart.
        let spacing = 0.0001 + ((lcg_next(level_rng) & 0xFFFF) as f64 / 65535.0) * 0.0004;
        bid -= spacing * price;
    }

    message.num_ask_levels = 5;
    let mut ask = price + spread / 2.0;
    for level in message.asks.iter_mut() {
        level.price = Price::from_dollars(ask);
        level.quantity = config.min_quantity as u64 + lcg_next(qty_rng) % quantity_span;
        let spacing = 0.0001 + ((lcg_next(level_rng) & 0xFFFF) as f64 / 65535.0) * 0.0004;
        ask += spacing * price;
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as TestCounter;

    #[test]
    fn subscribe_unsubscribe() {
        let source = SimSource::new(SimConfig::default());
        let aapl = SecurityId::new("AAPL");

        assert!(source.subscribe(aapl));
        assert!(!source.subscribe(aapl));
        assert_eq!(source.subscribed_securities(), vec![aapl]);

        assert!(source.unsubscribe(aapl));
        assert!(!source.unsubscribe(aapl));
        assert!(source.subscribed_securities().is_empty());
    }

    #[test]
    fn subscription_table_capacity() {
        let source = SimSource::new(SimConfig::default());
        for i in 0..MAX_SECURITIES {
            assert!(source.subscribe(SecurityId::new(&format!("SYM{i}"))));
        }
        assert!(!source.subscribe(SecurityId::new("ONEMORE")));
        assert!(source.unsubscribe(SecurityId::new("SYM0")));
        assert!(source.subscribe(SecurityId::new("ONEMORE")));
    }

    #[test]
    fn base_price_is_deterministic_per_symbol() {
        let source = SimSource::new(SimConfig::default());
        let aapl = SecurityId::new("AAPL");
        source.subscribe(aapl);
        let slot = source.find(aapl.to_bits()).unwrap();
        assert_eq!(f64::from_bits(slot.price_bits.load(Ordering::Relaxed)), 175.0);

        let unknown = SecurityId::new("ZZZZ");
        source.subscribe(unknown);
        let slot = source.find(unknown.to_bits()).unwrap();
        assert_eq!(f64::from_bits(slot.price_bits.load(Ordering::Relaxed)), 150.0);

        // Same symbol, fresh source, same seed and base.
        let other = SimSource::new(SimConfig::default());
        other.subscribe(aapl);
        let a = source.find(aapl.to_bits()).unwrap();
        let b = other.find(aapl.to_bits()).unwrap();
        assert_eq!(
            a.rng_state.load(Ordering::Relaxed),
            b.rng_state.load(Ordering::Relaxed)
        );
        assert_ne!(seed_from_id(aapl), seed_from_id(SecurityId::new("TSLA")));
    }

    #[test]
    fn generated_message_shape() {
        let config = SimConfig::default();
        let source = SimSource::new(config.clone());
        let aapl = SecurityId::new("AAPL");
        source.subscribe(aapl);
        let slot = source.find(aapl.to_bits()).unwrap();

        let mut qty_rng = 42u64;
        let mut level_rng = 123u64;
        let message = build_message(&source.inner, &config, slot, &mut qty_rng, &mut level_rng);

        assert_eq!(message.header.msg_type, msg_type::MARKET_DATA_L2);
        assert_eq!(message.header.length, 192);
        assert_eq!(message.security_id, aapl);
        assert!(message.timestamp_ns > 0);
        assert_eq!(message.num_bid_levels, 5);
        assert_eq!(message.num_ask_levels, 5);

        // Bids strictly descending, asks strictly ascending, no cross.
        for i in 0..4 {
            assert!(message.bids[i].price > message.bids[i + 1].price);
            assert!(message.asks[i].price < message.asks[i + 1].price);
        }
        assert!(message.asks[0].price > message.bids[0].price);

        for level in message.bids.iter().chain(message.asks.iter()) {
            assert!(level.quantity >= config.min_quantity as u64);
            assert!(level.quantity < config.max_quantity as u64);
        }

        // Spread lands near the configured target.
        let mid = (message.bids[0].price + message.asks[0].price) / 2;
        let spread_bps =
            (message.asks[0].price - message.bids[0].price).dollars() / mid.dollars() * 10_000.0;
        assert!((spread_bps - config.spread_bps).abs() < 1.0);
    }

    #[test]
    fn price_walk_stays_above_floor() {
        let config = SimConfig {
            base_price: 1.0,
            ..SimConfig::default()
        };
        let source = SimSource::new(config.clone());
        let id = SecurityId::new("PENNY");
        source.subscribe(id);
        let slot = source.find(id.to_bits()).unwrap();

        let mut qty_rng = 42u64;
        let mut level_rng = 123u64;
        for _ in 0..10_000 {
            let _ = build_message(&source.inner, &config, slot, &mut qty_rng, &mut level_rng);
            assert!(f64::from_bits(slot.price_bits.load(Ordering::Relaxed)) >= 1.0);
        }
    }

    #[test]
    fn lifecycle_and_delivery() {
        let config = SimConfig {
            update_interval_us: 100,
            ..SimConfig::default()
        };
        let source = SimSource::new(config);
        let delivered = Arc::new(TestCounter::new(0));
        {
            let delivered = delivered.clone();
            source.set_callback(Arc::new(move |message| {
                assert_eq!(message.num_bid_levels, 5);
                delivered.fetch_add(1, Ordering::Relaxed);
            }));
        }
        source.subscribe(SecurityId::new("AAPL"));

        assert!(!source.is_running());
        assert!(source.start());
        assert!(!source.start());
        assert!(source.is_running());

        thread::sleep(Duration::from_millis(50));
        source.stop();
        assert!(!source.is_running());

        let count = delivered.load(Ordering::Relaxed);
        assert!(count > 0);
        // Stopped means stopped.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(delivered.load(Ordering::Relaxed), count);
    }

    #[test]
    fn sequence_numbers_are_monotone() {
        let source = SimSource::new(SimConfig::default());
        let id = SecurityId::new("MSFT");
        source.subscribe(id);
        let slot = source.find(id.to_bits()).unwrap();

        let mut qty_rng = 42u64;
        let mut level_rng = 123u64;
        let config = SimConfig::default();
        let first = build_message(&source.inner, &config, slot, &mut qty_rng, &mut level_rng);
        let second = build_message(&source.inner, &config, slot, &mut qty_rng, &mut level_rng);
        assert_eq!(second.header.seq_no, first.header.seq_no + 1);
    }
}
