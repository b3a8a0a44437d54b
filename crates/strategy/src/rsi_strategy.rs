use tracing::{debug, info};

use common::{Candle, DepthSnapshot, Direction, Signal};

use crate::indicators::rsi_series;
use crate::{epoch_secs, Strategy};

/// RSI threshold strategy.
///
/// Buys when RSI drops to the oversold level, sells when it reaches the
/// overbought level. A last-action memory keeps the same signal from firing
/// on every evaluation while the threshold condition persists; only `reset`
/// clears it.
pub struct RsiStrategy {
    period: usize,
    oversold: f64,
    overbought: f64,
    prices: Vec<f64>,
    rsi_values: Vec<f64>,
    last_action: Option<Direction>,
}

impl RsiStrategy {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        info!(period, oversold, overbought, "Initialized RSI strategy");
        Self {
            period,
            oversold,
            overbought,
            prices: Vec::new(),
            rsi_values: Vec::new(),
            last_action: None,
        }
    }

    /// Latest RSI value, if enough history has accumulated.
    pub fn current_rsi(&self) -> Option<f64> {
        self.rsi_values.last().copied()
    }

    fn truncate_history(&mut self) {
        let max = self.period * 3;
        if self.prices.len() > max {
            self.prices.drain(..self.prices.len() - max);
        }
    }

    fn recompute(&mut self) {
        self.rsi_values = rsi_series(&self.prices, self.period);
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        "RSI Strategy"
    }

    fn feed_candles(&mut self, candles: &[Candle]) {
        self.prices
            .extend(candles.iter().filter(|c| c.is_closed).map(|c| c.close));
        self.truncate_history();
        self.recompute();
        debug!(count = candles.len(), "Fed candle batch to RSI strategy");
    }

    fn feed_tick(&mut self, price: f64, _quantity: f64, _volume: f64) {
        self.prices.push(price);
        self.truncate_history();
        self.recompute();
    }

    fn feed_depth(&mut self, _depth: &DepthSnapshot) {}

    fn execute(&mut self, current_price: f64, in_position: bool) -> Option<Signal> {
        let current_rsi = *self.rsi_values.last()?;

        if current_rsi <= self.oversold && !in_position && self.last_action != Some(Direction::Buy)
        {
            info!(rsi = current_rsi, price = current_price, "Oversold condition detected");
            self.last_action = Some(Direction::Buy);
            // Lower RSI → stronger conviction
            let confidence = (1.0 - current_rsi / self.oversold).clamp(0.1, 1.0);
            return Some(Signal::with_confidence(
                Direction::Buy,
                current_price,
                epoch_secs(),
                confidence,
            ));
        } else if current_rsi >= self.overbought
            && in_position
            && self.last_action != Some(Direction::Sell)
        {
            info!(rsi = current_rsi, price = current_price, "Overbought condition detected");
            self.last_action = Some(Direction::Sell);
            let confidence =
                ((current_rsi - self.overbought) / (100.0 - self.overbought)).clamp(0.1, 1.0);
            return Some(Signal::with_confidence(
                Direction::Sell,
                current_price,
                epoch_secs(),
                confidence,
            ));
        }

        None
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.rsi_values.clear();
        self.last_action = None;
    }
}
