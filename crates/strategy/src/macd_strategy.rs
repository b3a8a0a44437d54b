use tracing::{debug, info};

use common::{Candle, DepthSnapshot, Direction, Signal};

use crate::indicators::macd;
use crate::{epoch_secs, Crossover, Strategy};

/// MACD crossover strategy.
///
/// Applies the moving-average crossover rule to the MACD line against its
/// signal line. Signal confidence scales with the histogram's magnitude.
pub struct MacdStrategy {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    prices: Vec<f64>,
    macd_line: Vec<f64>,
    signal_line: Vec<f64>,
    histogram: Vec<f64>,
    last_crossover: Option<Crossover>,
}

impl MacdStrategy {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        info!(fast_period, slow_period, signal_period, "Initialized MACD strategy");
        Self {
            fast_period,
            slow_period,
            signal_period,
            prices: Vec::new(),
            macd_line: Vec::new(),
            signal_line: Vec::new(),
            histogram: Vec::new(),
            last_crossover: None,
        }
    }

    /// The direction of the most recent crossover that produced a signal.
    pub fn last_crossover(&self) -> Option<Crossover> {
        self.last_crossover
    }

    fn truncate_history(&mut self) {
        let max = self.fast_period.max(self.slow_period) * 3;
        if self.prices.len() > max {
            self.prices.drain(..self.prices.len() - max);
        }
    }

    fn recompute(&mut self) {
        if let Some(out) = macd(
            &self.prices,
            self.fast_period,
            self.slow_period,
            self.signal_period,
        ) {
            self.macd_line = out.macd;
            self.signal_line = out.signal;
            self.histogram = out.histogram;
        }
    }

    /// Histogram magnitude normalized into [0, 1].
    fn histogram_confidence(&self) -> f64 {
        let last = self.histogram.last().copied().unwrap_or(0.0);
        (last.abs() / 0.5).min(1.0)
    }
}

impl Strategy for MacdStrategy {
    fn name(&self) -> &str {
        "MACD Strategy"
    }

    fn feed_candles(&mut self, candles: &[Candle]) {
        self.prices
            .extend(candles.iter().filter(|c| c.is_closed).map(|c| c.close));
        self.truncate_history();
        self.recompute();
        debug!(count = candles.len(), "Fed candle batch to MACD strategy");
    }

    fn feed_tick(&mut self, price: f64, _quantity: f64, _volume: f64) {
        self.prices.push(price);
        self.truncate_history();
        self.recompute();
    }

    fn feed_depth(&mut self, _depth: &DepthSnapshot) {}

    fn execute(&mut self, current_price: f64, in_position: bool) -> Option<Signal> {
        if self.macd_line.len() < 2 || self.signal_line.len() < 2 {
            return None;
        }

        let curr_macd = self.macd_line[self.macd_line.len() - 1];
        let prev_macd = self.macd_line[self.macd_line.len() - 2];
        let curr_signal = self.signal_line[self.signal_line.len() - 1];
        let prev_signal = self.signal_line[self.signal_line.len() - 2];

        // Same asymmetric non-strict comparison as the SMA crossover rule.
        if prev_macd <= prev_signal && curr_macd > curr_signal {
            if !in_position {
                info!(price = current_price, "Bullish MACD crossover detected");
                self.last_crossover = Some(Crossover::Bullish);
                let confidence = self.histogram_confidence();
                return Some(Signal::with_confidence(
                    Direction::Buy,
                    current_price,
                    epoch_secs(),
                    confidence,
                ));
            }
        } else if prev_macd >= prev_signal && curr_macd < curr_signal {
            if in_position {
                info!(price = current_price, "Bearish MACD crossover detected");
                self.last_crossover = Some(Crossover::Bearish);
                let confidence = self.histogram_confidence();
                return Some(Signal::with_confidence(
                    Direction::Sell,
                    current_price,
                    epoch_secs(),
                    confidence,
                ));
            }
        }

        None
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.macd_line.clear();
        self.signal_line.clear();
        self.histogram.clear();
        self.last_crossover = None;
    }
}
