/// Exponential moving average with multiplier `2 / (period + 1)`.
///
/// The first value is seeded with the simple mean of the first `period`
/// points; each later value is `(price - prev) * k + prev`. Returns one value
/// per point from the seed onward, oldest first; empty when `data` is shorter
/// than `period`.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(data.len() - period + 1);
    out.push(seed);
    for &price in &data[period..] {
        let prev = *out.last().unwrap();
        out.push((price - prev) * k + prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_when_insufficient_data() {
        assert!(ema(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn ema_seed_is_simple_mean() {
        let values = ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(values, vec![4.0]);
    }

    #[test]
    fn ema_follows_recurrence() {
        // period 2 → k = 2/3; seed = 1.5
        let values = ema(&[1.0, 2.0, 3.0], 2);
        assert_eq!(values.len(), 2);
        assert!((values[0] - 1.5).abs() < 1e-12);
        let expected = (3.0 - 1.5) * (2.0 / 3.0) + 1.5;
        assert!((values[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn ema_length_tracks_input() {
        let data: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        assert_eq!(ema(&data, 10).len(), 41);
    }
}
