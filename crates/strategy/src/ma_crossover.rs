use tracing::{debug, info};

use common::{Candle, DepthSnapshot, Direction, Signal};

use crate::indicators::sma;
use crate::{epoch_secs, Crossover, Strategy};

/// Moving-average crossover strategy.
///
/// Buys when the fast SMA crosses above the slow SMA, sells when it crosses
/// back below. By convention `fast_period < slow_period`; this is not
/// enforced.
pub struct MaCrossoverStrategy {
    fast_period: usize,
    slow_period: usize,
    prices: Vec<f64>,
    fast_ma: Vec<f64>,
    slow_ma: Vec<f64>,
    last_crossover: Option<Crossover>,
}

impl MaCrossoverStrategy {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        info!(fast_period, slow_period, "Initialized moving-average crossover strategy");
        Self {
            fast_period,
            slow_period,
            prices: Vec::new(),
            fast_ma: Vec::new(),
            slow_ma: Vec::new(),
            last_crossover: None,
        }
    }

    /// The direction of the most recent crossover that produced a signal.
    pub fn last_crossover(&self) -> Option<Crossover> {
        self.last_crossover
    }

    /// Retained history: twice the longest period keeps every window that the
    /// averages can still see.
    fn max_history(&self) -> usize {
        self.fast_period.max(self.slow_period) * 2
    }

    fn truncate_history(&mut self) {
        let max = self.max_history();
        if self.prices.len() > max {
            self.prices.drain(..self.prices.len() - max);
        }
    }

    fn recompute(&mut self) {
        if self.prices.len() >= self.slow_period {
            self.fast_ma = sma(&self.prices, self.fast_period);
            self.slow_ma = sma(&self.prices, self.slow_period);
        }
    }
}

impl Strategy for MaCrossoverStrategy {
    fn name(&self) -> &str {
        "Moving Average Crossover"
    }

    fn feed_candles(&mut self, candles: &[Candle]) {
        self.prices
            .extend(candles.iter().filter(|c| c.is_closed).map(|c| c.close));
        self.truncate_history();
        self.recompute();
        debug!(count = candles.len(), "Fed candle batch to MA crossover strategy");
    }

    fn feed_tick(&mut self, price: f64, _quantity: f64, _volume: f64) {
        self.prices.push(price);
        self.truncate_history();
        self.recompute();
    }

    fn feed_depth(&mut self, _depth: &DepthSnapshot) {}

    fn execute(&mut self, current_price: f64, in_position: bool) -> Option<Signal> {
        // Two values per series are needed to observe a crossing.
        if self.fast_ma.len() < 2 || self.slow_ma.len() < 2 {
            return None;
        }

        let curr_fast = self.fast_ma[self.fast_ma.len() - 1];
        let prev_fast = self.fast_ma[self.fast_ma.len() - 2];
        let curr_slow = self.slow_ma[self.slow_ma.len() - 1];
        let prev_slow = self.slow_ma[self.slow_ma.len() - 2];

        // The non-strict comparison on the previous side only is deliberate:
        // a run of equal averages still counts as "was not above" for the
        // bullish branch and "was not below" for the bearish one.
        if prev_fast <= prev_slow && curr_fast > curr_slow {
            if !in_position {
                info!(price = current_price, "Bullish crossover detected");
                self.last_crossover = Some(Crossover::Bullish);
                return Some(Signal::new(Direction::Buy, current_price, epoch_secs()));
            }
        } else if prev_fast >= prev_slow && curr_fast < curr_slow {
            if in_position {
                info!(price = current_price, "Bearish crossover detected");
                self.last_crossover = Some(Crossover::Bearish);
                return Some(Signal::new(Direction::Sell, current_price, epoch_secs()));
            }
        }

        None
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.fast_ma.clear();
        self.slow_ma.clear();
        self.last_crossover = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_closes(strategy: &mut MaCrossoverStrategy, closes: &[f64]) {
        for &c in closes {
            strategy.feed_tick(c, 1.0, c);
        }
    }

    #[test]
    fn no_signal_before_warmup() {
        let mut s = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut s, &[1.0, 1.0, 1.0]);
        // Slow MA has a single value — not enough to detect a crossing
        assert!(s.execute(1.0, false).is_none());
    }

    #[test]
    fn buy_fires_on_the_exact_crossover_tick() {
        // Hand-computed with fast 2 / slow 3 over [1,1,1,2,3,10]:
        // after the 4th close, fast MA = [1, 1, 1.5], slow MA = [1, 4/3],
        // so prev_fast(1) <= prev_slow(1) and curr_fast(1.5) > curr_slow(4/3).
        let mut s = MaCrossoverStrategy::new(2, 3);
        let closes = [1.0, 1.0, 1.0, 2.0, 3.0, 10.0];
        let mut fired_at = None;

        for (i, &c) in closes.iter().enumerate() {
            s.feed_tick(c, 1.0, c);
            if let Some(signal) = s.execute(c, false) {
                assert_eq!(signal.direction, Direction::Buy);
                fired_at = Some(i);
                break;
            }
        }

        assert_eq!(fired_at, Some(3));
        assert_eq!(s.last_crossover(), Some(Crossover::Bullish));
    }

    #[test]
    fn equal_previous_averages_still_count_as_bullish() {
        // Pins the asymmetric non-strict comparison at the equality boundary:
        // prev_fast == prev_slow satisfies the bullish branch's `<=`.
        let mut s = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut s, &[1.0, 1.0, 1.0, 2.0]);
        let signal = s.execute(2.0, false).expect("bullish crossover at equality");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn no_buy_while_in_position() {
        let mut s = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut s, &[1.0, 1.0, 1.0, 2.0]);
        assert!(s.execute(2.0, true).is_none());
    }

    #[test]
    fn sell_fires_on_bearish_crossover_only_in_position() {
        let mut s = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut s, &[10.0, 10.0, 10.0, 5.0]);

        assert!(s.execute(5.0, false).is_none());

        let mut s = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut s, &[10.0, 10.0, 10.0, 5.0]);
        let signal = s.execute(5.0, true).expect("bearish crossover");
        assert_eq!(signal.direction, Direction::Sell);
        assert_eq!(s.last_crossover(), Some(Crossover::Bearish));
    }

    #[test]
    fn candle_batch_and_tick_feeds_agree() {
        let closes = [1.0, 1.0, 1.0, 2.0, 3.0, 10.0];

        let mut by_tick = MaCrossoverStrategy::new(2, 3);
        feed_closes(&mut by_tick, &closes);

        let mut by_batch = MaCrossoverStrategy::new(2, 3);
        let candles: Vec<common::Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| common::Candle {
                timestamp: i as i64 * 60_000,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
                close_time: i as i64 * 60_000 + 59_999,
                is_closed: true,
            })
            .collect();
        by_batch.feed_candles(&candles);

        assert_eq!(by_tick.fast_ma, by_batch.fast_ma);
        assert_eq!(by_tick.slow_ma, by_batch.slow_ma);
    }

    #[test]
    fn open_candles_are_ignored() {
        let mut s = MaCrossoverStrategy::new(2, 3);
        let open_candle = common::Candle {
            timestamp: 0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            close_time: 59_999,
            is_closed: false,
        };
        s.feed_candles(&[open_candle]);
        assert!(s.prices.is_empty());
    }

    #[test]
    fn reset_then_refeed_is_idempotent() {
        let closes = [1.0, 1.0, 1.0, 2.0, 3.0, 10.0];
        let mut s = MaCrossoverStrategy::new(2, 3);

        feed_closes(&mut s, &closes);
        let first_fast = s.fast_ma.clone();
        let first_slow = s.slow_ma.clone();

        s.reset();
        assert!(s.prices.is_empty());
        assert!(s.execute(1.0, false).is_none());

        feed_closes(&mut s, &closes);
        assert_eq!(s.fast_ma, first_fast);
        assert_eq!(s.slow_ma, first_slow);
    }

    #[test]
    fn history_is_bounded() {
        let mut s = MaCrossoverStrategy::new(2, 3);
        for i in 0..100 {
            s.feed_tick(i as f64, 1.0, i as f64);
        }
        assert!(s.prices.len() <= 6);
    }
}
