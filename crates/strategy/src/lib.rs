pub mod descriptor;
pub mod indicators;
pub mod ma_crossover;
pub mod macd_strategy;
pub mod rsi_strategy;

pub use descriptor::{StrategyFileConfig, StrategySpec};
pub use ma_crossover::MaCrossoverStrategy;
pub use macd_strategy::MacdStrategy;
pub use rsi_strategy::RsiStrategy;

use common::{Candle, DepthSnapshot, Signal};

/// All strategy implementations must satisfy this trait.
///
/// A strategy owns a bounded close-price history plus whatever derived series
/// it needs. The orchestrator serializes every call through a single lock per
/// strategy instance, so implementations never see `feed_*` and `execute`
/// interleave.
pub trait Strategy: Send {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Append a batch of closed candles to the price history and recompute
    /// all derived series over the retained window. Candles not marked closed
    /// are ignored.
    fn feed_candles(&mut self, candles: &[Candle]);

    /// Append one trade observation, truncate the history to the retention
    /// window, and recompute derived series.
    fn feed_tick(&mut self, price: f64, quantity: f64, volume: f64);

    /// Accept an order book snapshot. The three reference strategies ignore
    /// depth; this is the extension point for depth-aware strategies.
    fn feed_depth(&mut self, depth: &DepthSnapshot);

    /// Evaluate the current derived-series state against the position flag
    /// and return at most one signal.
    ///
    /// Never touches the raw or derived series; the `&mut` receiver exists
    /// only for the last-action memory that suppresses repeated signals.
    fn execute(&mut self, current_price: f64, in_position: bool) -> Option<Signal>;

    /// Clear all raw and derived series and the last-action memory, returning
    /// the strategy to its initial empty state.
    fn reset(&mut self);
}

/// Which way the two tracked series last crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Bullish,
    Bearish,
}

pub(crate) fn epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
