use ta::Next;
use ta::indicators::ExponentialMovingAverage;

/// EMA of `values` with smoothing factor `2 / (period + 1)`, seeded with the
/// first value. One output per input; `None` for a zero period.
pub fn ema_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(period).ok()?;
    Some(values.iter().map(|v| ema.next(*v)).collect())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
