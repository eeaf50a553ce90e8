//! Simulated high-frequency L2 market data pipeline.
//!
//! Updates flow from a [`source::MarketDataSource`] through a wait-free
//! [`spsc::SpscRing`] into a lock-free [`store::SecurityStore`] that any
//! number of readers can snapshot without blocking the writer. The
//! [`feed::MarketDataFeed`] composes the three and reports latency and
//! backpressure telemetry.

pub mod config;
pub mod feed;
pub mod metrics;
pub mod seeder;
pub mod sim;
pub mod source;
pub mod spsc;
pub mod store;
pub mod types;
pub mod udp;
pub mod util;
