use super::ema;

/// MACD line, signal line and histogram, mutually aligned.
///
/// All three vectors have the signal line's length; the MACD line's head is
/// trimmed to match.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD over a slice of close prices (oldest first).
///
/// MACD line = EMA(fast) − EMA(slow), aligned to the slow EMA's length by
/// trimming the fast series' head; signal line = EMA(MACD line,
/// `signal_period`); histogram = MACD − signal. Returns `None` until the
/// price series exceeds `slow` points and the MACD line reaches
/// `signal_period` values.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Option<MacdSeries> {
    if closes.len() <= slow {
        return None;
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let macd_line: Vec<f64> = fast_ema[fast_ema.len() - slow_ema.len()..]
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();

    if macd_line.len() < signal_period {
        return None;
    }

    let signal = ema(&macd_line, signal_period);
    let macd_tail = macd_line[macd_line.len() - signal.len()..].to_vec();
    let histogram: Vec<f64> = macd_tail.iter().zip(&signal).map(|(m, s)| m - s).collect();

    Some(MacdSeries {
        macd: macd_tail,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_none_with_insufficient_data() {
        let prices = vec![100.0; 26]; // need > slow
        assert!(macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn macd_none_until_signal_period_reached() {
        // 28 closes → slow EMA has 3 values → MACD line of 3 < signal 9
        let prices: Vec<f64> = (0..28).map(|i| 100.0 + i as f64).collect();
        assert!(macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn macd_some_with_sufficient_data() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert!(macd(&prices, 12, 26, 9).is_some());
    }

    #[test]
    fn macd_series_are_aligned() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let out = macd(&prices, 3, 6, 3).unwrap();
        assert_eq!(out.macd.len(), out.signal.len());
        assert_eq!(out.macd.len(), out.histogram.len());
        for i in 0..out.macd.len() {
            let expected = out.macd[i] - out.signal[i];
            assert!((out.histogram[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_positive_in_sustained_uptrend() {
        // Fast EMA sits above slow EMA when prices keep rising
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 2.0).collect();
        let out = macd(&prices, 3, 6, 3).unwrap();
        assert!(*out.macd.last().unwrap() > 0.0);
    }
}
