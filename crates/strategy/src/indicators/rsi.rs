/// Wilder-smoothed RSI series over a slice of close prices (oldest first).
///
/// The first average gain/loss is the simple mean of the first `period`
/// changes; subsequent averages use `avg = (avg_prev * (period - 1) + value)
/// / period`. A zero average loss saturates RSI to 100 explicitly rather than
/// letting the division produce a NaN. Returns one RSI value per smoothed
/// average, oldest first; empty until `period + 1` closes are available.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| (-c).max(0.0)).collect();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(changes.len() - period + 1);
    out.push(rsi_point(avg_gain, avg_loss));

    for i in period..changes.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        out.push(rsi_point(avg_gain, avg_loss));
    }
    out
}

fn rsi_point(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_when_insufficient_data() {
        // Need at least period+1 closes for one value
        let prices = vec![100.0; 14];
        assert!(rsi_series(&prices, 14).is_empty());
    }

    #[test]
    fn rsi_one_value_at_warmup() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi_series(&prices, 14).len(), 1);
    }

    #[test]
    fn rsi_all_gains_saturates_to_100() {
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let values = rsi_series(&prices, 3);
        for v in values {
            assert!((v - 100.0).abs() < 1e-9, "Expected 100, got {v}");
        }
    }

    #[test]
    fn rsi_all_losses_trends_to_0() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let values = rsi_series(&prices, 3);
        let last = *values.last().unwrap();
        assert!((last - 0.0).abs() < 1e-9, "Expected ~0, got {last}");
    }

    #[test]
    fn rsi_flat_series_is_100_by_zero_loss_rule() {
        // No losses at all → avg_loss = 0 → saturate, never NaN
        let prices = vec![100.0; 16];
        for v in rsi_series(&prices, 14) {
            assert!(!v.is_nan());
            assert_eq!(v, 100.0);
        }
    }

    #[test]
    fn rsi_stays_in_bounds_on_mixed_series() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09, 44.50, 43.90,
        ];
        for v in rsi_series(&prices, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }
}
