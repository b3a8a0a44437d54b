/// Simple moving average over every full window of `period` values.
///
/// Returns one value per window, oldest first; empty when `data` is shorter
/// than `period`.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }
    data.windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}
