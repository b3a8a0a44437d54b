use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{Candle, DepthSnapshot, Tick};
use crate::Result;

/// A market data event pushed by the feed while subscribed.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Candle(Candle),
    Tick(Tick),
    Depth(DepthSnapshot),
}

/// Abstraction over the market data transport.
///
/// `BinanceFeed` in `crates/engine` implements this against the real
/// exchange. Tests script it with in-memory implementations.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Latest traded price for a symbol. May block on the transport.
    async fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Most recent closed candles, oldest first, for strategy warm-up.
    async fn historical_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Start streaming candle/tick/depth events for a symbol into `events`.
    ///
    /// The returned [`Subscription`] owns the streaming task; dropping it or
    /// calling [`Subscription::unsubscribe`] stops the stream. Events arrive
    /// on the feed's own task, never on the caller's.
    async fn subscribe(&self, symbol: &str, events: mpsc::Sender<MarketEvent>) -> Result<Subscription>;
}

/// Handle to an active feed subscription.
///
/// Owning the task handle here keeps each subscription independent — two
/// subscribers never share callback slots.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stop the streaming task. No further events are delivered.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
