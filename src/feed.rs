// src/feed.rs
// Wires a source to the store through the SPSC ring: the source thread
// produces into the ring, a dedicated consumer thread applies to the store.
// On backpressure the producer drops; deterministic latency beats
// completeness here.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use crate::source::{MarketDataCallback, MarketDataSource};
use crate::spsc::SpscRing;
use crate::store::SecurityStore;
use crate::types::{MarketDataL2Message, SecurityId};
use crate::util::now_nanos;

pub const DEFAULT_RING_SIZE: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Consumer sleep when the ring is empty; 0 yields to the scheduler.
    pub consumer_yield_us: u32,
    pub enable_statistics: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            consumer_yield_us: 1,
            enable_statistics: true,
        }
    }
}

/// Feed telemetry. All counters are relaxed and best-effort.
#[derive(Debug, Default)]
pub struct Statistics {
    pub messages_produced: AtomicU64,
    pub messages_consumed: AtomicU64,
    pub ring_full_events: AtomicU64,
    pub ring_empty_events: AtomicU64,
    pub consumer_yields: AtomicU64,
    pub total_latency_ns: AtomicU64,
    pub max_latency_ns: AtomicU64,
}

impl Statistics {
    pub const fn new() -> Self {
        Self {
            messages_produced: AtomicU64::new(0),
            messages_consumed: AtomicU64::new(0),
            ring_full_events: AtomicU64::new(0),
            ring_empty_events: AtomicU64::new(0),
            consumer_yields: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            max_latency_ns: AtomicU64::new(0),
        }
    }

    /// 0.0 until something has been consumed.
    pub fn average_latency_ns(&self) -> f64 {
        let consumed = self.messages_consumed.load(Ordering::Relaxed);
        if consumed == 0 {
            return 0.0;
        }
        self.total_latency_ns.load(Ordering::Relaxed) as f64 / consumed as f64
    }

    pub fn reset(&self) {
        self.messages_produced.store(0, Ordering::Relaxed);
        self.messages_consumed.store(0, Ordering::Relaxed);
        self.ring_full_events.store(0, Ordering::Relaxed);
        self.ring_empty_events.store(0, Ordering::Relaxed);
        self.consumer_yields.store(0, Ordering::Relaxed);
        self.total_latency_ns.store(0, Ordering::Relaxed);
        self.max_latency_ns.store(0, Ordering::Relaxed);
    }
}

/// Coordinator owning the ring, the consumer thread and the telemetry.
pub struct MarketDataFeed {
    source: Arc<dyn MarketDataSource>,
    store: Arc<SecurityStore>,
    config: FeedConfig,
    ring: Arc<SpscRing<MarketDataL2Message, DEFAULT_RING_SIZE>>,
    running: Arc<AtomicBool>,
    stats: Arc<Statistics>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataFeed {
    /// Registers the producer callback on the source. Set up the feed before
    /// starting the source elsewhere; `start` here drives both.
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<SecurityStore>,
        config: FeedConfig,
    ) -> Self {
        let ring = Arc::new(SpscRing::new());
        let running = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Statistics::new());

        let callback: MarketDataCallback = {
            let ring = ring.clone();
            let running = running.clone();
            let stats = stats.clone();
            let enable_statistics = config.enable_statistics;
            Arc::new(move |message: &MarketDataL2Message| {
                if !running.load(Ordering::Acquire) {
                    return;
                }
                let mut message = *message;
                if enable_statistics {
                    // Restamp so the latency measured is ring + apply.
                    message.timestamp_ns = now_nanos();
                }
                if ring.try_push(message).is_ok() {
                    if enable_statistics {
                        stats.messages_produced.fetch_add(1, Ordering::Relaxed);
                    }
                } else if enable_statistics {
                    stats.ring_full_events.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        source.set_callback(callback);

        Self {
            source,
            store,
            config,
            ring,
            running,
            stats,
            consumer: Mutex::new(None),
        }
    }

    /// False when already running or the source refuses to start.
    pub fn start(&self) -> bool {
        if self.running.load(Ordering::Acquire) {
            return false;
        }
        if self.config.enable_statistics {
            self.stats.reset();
        }
        if !self.source.start() {
            return false;
        }
        self.running.store(true, Ordering::Release);

        let ring = self.ring.clone();
        let store = self.store.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();
        match thread::Builder::new()
            .name("md-consumer".into())
            .spawn(move || consumer_loop(ring, store, running, stats, config))
        {
            Ok(handle) => {
                *self.consumer.lock().unwrap() = Some(handle);
                info!("market data feed started");
                true
            }
            Err(e) => {
                warn!("failed to spawn consumer thread: {e}");
                self.running.store(false, Ordering::Release);
                self.source.stop();
                false
            }
        }
    }

    /// Idempotent. Stops the source and joins the consumer.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.source.stop();
        if let Some(handle) = self.consumer.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("market data feed stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Adds to the store first, then the source; rolls the store back when
    /// the source refuses.
    pub fn subscribe(&self, id: SecurityId) -> bool {
        if !self.store.add_security(id) {
            return false;
        }
        if !self.source.subscribe(id) {
            self.store.remove_security(id);
            return false;
        }
        true
    }

    /// True only when both the source and the store drop the security.
    pub fn unsubscribe(&self, id: SecurityId) -> bool {
        let source_result = self.source.unsubscribe(id);
        let store_result = self.store.remove_security(id);
        source_result && store_result
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Ring occupancy in [0.0, 1.0].
    pub fn ring_utilization(&self) -> f64 {
        self.ring.len() as f64 / self.ring.capacity() as f64
    }

    pub fn subscribed_securities(&self) -> Vec<SecurityId> {
        self.source.subscribed_securities()
    }
}

impl Drop for MarketDataFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consumer_loop(
    ring: Arc<SpscRing<MarketDataL2Message, DEFAULT_RING_SIZE>>,
    store: Arc<SecurityStore>,
    running: Arc<AtomicBool>,
    stats: Arc<Statistics>,
    config: FeedConfig,
) {
    while running.load(Ordering::Acquire) {
        if let Some(message) = ring.try_pop() {
            let applied = store.update_from_l2(&message);
            if config.enable_statistics && applied {
                stats.messages_consumed.fetch_add(1, Ordering::Relaxed);

                let latency = now_nanos().saturating_sub(message.timestamp_ns);
                stats.total_latency_ns.fetch_add(latency, Ordering::Relaxed);

                // Single writer here, so the weak CAS settles immediately;
                // racing an external reset is acceptable for monitoring.
                let mut current_max = stats.max_latency_ns.load(Ordering::Relaxed);
                while latency > current_max {
                    match stats.max_latency_ns.compare_exchange_weak(
                        current_max,
                        latency,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => break,
                        Err(observed) => current_max = observed,
                    }
                }
            }
        } else {
            if config.enable_statistics {
                stats.ring_empty_events.fetch_add(1, Ordering::Relaxed);
            }
            if config.consumer_yield_us > 0 {
                thread::sleep(Duration::from_micros(config.consumer_yield_us as u64));
                if config.enable_statistics {
                    stats.consumer_yields.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                thread::yield_now();
            }
        }
    }
}
