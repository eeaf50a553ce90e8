// src/source.rs
use std::sync::Arc;

use crate::types::{MarketDataL2Message, SecurityId};

/// Delivery callback, invoked on the source's own thread for every update.
///
/// Must be cheap and non-blocking, and must not call back into `start` or
/// `stop` on the same source. Set it before `start`.
pub type MarketDataCallback = Arc<dyn Fn(&MarketDataL2Message) + Send + Sync>;

/// A producer of L2 updates: simulator, file replay or exchange feed.
///
/// Implementations deliver zero or more messages per subscribed security
/// between `start` and `stop`. All methods are callable from any thread.
pub trait MarketDataSource: Send + Sync {
    /// False when already running.
    fn start(&self) -> bool;

    /// Idempotent; joins the delivery thread.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// False when already subscribed or the subscription table is full.
    fn subscribe(&self, id: SecurityId) -> bool;

    /// False when not subscribed.
    fn unsubscribe(&self, id: SecurityId) -> bool;

    fn set_callback(&self, callback: MarketDataCallback);

    fn subscribed_securities(&self) -> Vec<SecurityId>;
}
