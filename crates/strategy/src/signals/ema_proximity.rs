use async_trait::async_trait;
use common::models::{Candle, Direction, SeriesKey, Verdict};
use market_data::HistorySource;
use storage::{CandleStore, PreloadReport, UpsertOutcome};
use tracing::{debug, warn};

use crate::chart::{self, ChartRenderer};
use crate::indicators::{ema_series, mean};
use crate::signals::{Signal, SignalEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaProximityParams {
    /// EMA window length.
    pub period: usize,
    /// Maximum `|close - ema| / ema` still counted as "near" (inclusive).
    pub threshold: f64,
    /// Bars averaged for the direction check, current bar included.
    pub lookback: usize,
    /// Bars kept per series.
    pub limit: usize,
}

impl Default for EmaProximityParams {
    fn default() -> Self {
        Self {
            period: 200,
            threshold: 0.002,
            lookback: 21,
            limit: 500,
        }
    }
}

/// Fires when the close sits within `threshold` of the EMA; the direction
/// comes from the lookback mean relative to the EMA.
#[derive(Debug, Clone)]
pub struct EmaProximity {
    params: EmaProximityParams,
}

impl EmaProximity {
    pub fn new(params: EmaProximityParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EmaProximityParams {
        &self.params
    }

    pub fn label(&self) -> String {
        format!("EMA{}", self.params.period)
    }

    pub fn evaluate(&self, window: &[Candle]) -> Option<Verdict> {
        self.assess(window).map(|(verdict, _)| verdict)
    }

    /// Verdict plus the EMA series aligned with `window`.
    fn assess(&self, window: &[Candle]) -> Option<(Verdict, Vec<f64>)> {
        let period = self.params.period;
        if period == 0 || window.len() < period {
            return None;
        }

        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let ema = ema_series(&closes, period)?;
        let indicator_value = *ema.last()?;
        let close = *closes.last()?;

        if !indicator_value.is_finite() || indicator_value <= 0.0 {
            return None;
        }

        let distance_ratio = (close - indicator_value).abs() / indicator_value;
        if distance_ratio > self.params.threshold {
            return None;
        }

        let lookback = self.params.lookback.clamp(1, closes.len());
        let mean_close = mean(&closes[closes.len() - lookback..])?;
        let direction = if mean_close > indicator_value {
            Direction::Long
        } else if mean_close < indicator_value {
            Direction::Short
        } else {
            return None;
        };

        let verdict = Verdict {
            direction,
            distance_ratio,
            indicator_value,
            close,
        };
        Some((verdict, ema))
    }
}

/// The EMA proximity indicator together with the candle cache it reads.
pub struct EmaProximitySignal {
    name: String,
    indicator: EmaProximity,
    store: CandleStore,
    renderer: ChartRenderer,
}

impl EmaProximitySignal {
    pub fn new(params: EmaProximityParams) -> Self {
        let indicator = EmaProximity::new(params);
        Self {
            name: indicator.label(),
            store: CandleStore::new(params.limit),
            indicator,
            renderer: chart::render,
        }
    }

    pub fn with_renderer(mut self, renderer: ChartRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn indicator(&self) -> &EmaProximity {
        &self.indicator
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn install(&mut self, key: SeriesKey, history: Vec<Candle>) {
        self.store.install(key, history);
    }
}

impl Default for EmaProximitySignal {
    fn default() -> Self {
        Self::new(EmaProximityParams::default())
    }
}

#[async_trait]
impl Signal for EmaProximitySignal {
    fn name(&self) -> &str {
        &self.name
    }

    async fn preload(
        &mut self,
        history: &dyn HistorySource,
        symbols: &[String],
        intervals: &[String],
    ) -> PreloadReport {
        self.store.preload(history, symbols, intervals).await
    }

    fn evaluate(&mut self, key: &SeriesKey, candle: Candle) -> Option<SignalEvent> {
        let Some(window) = self.store.upsert(key, candle) else {
            debug!("No history loaded for {}, skipping", key);
            return None;
        };

        if window.outcome == UpsertOutcome::Stale {
            debug!("Stale bar ignored for {} at {}", key, candle.open_time);
            return None;
        }

        let (verdict, ema) = self.indicator.assess(window.candles)?;

        let start = window.candles.len().saturating_sub(self.indicator.params.lookback);
        let chart = match (self.renderer)(&window.candles[start..], &ema[start..]) {
            Ok(png) => Some(png),
            Err(e) => {
                warn!("Chart rendering failed for {}: {}", key, e);
                None
            }
        };

        Some(SignalEvent {
            key: key.clone(),
            indicator: self.name.clone(),
            verdict,
            chart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Candle::from_millis(i as i64 * 900_000, *c, c + 0.5, c - 0.5, *c, 1.0).unwrap()
            })
            .collect()
    }

    fn params(lookback: usize) -> EmaProximityParams {
        // period 3 gives k = 0.5, which keeps the EMA exact in binary floating point.
        EmaProximityParams {
            period: 3,
            threshold: 0.002,
            lookback,
            limit: 50,
        }
    }

    #[test]
    fn test_insufficient_history_fails_closed() {
        let indicator = EmaProximity::new(params(1));
        assert_eq!(indicator.evaluate(&bars(&[500.0, 500.0])), None);
        assert_eq!(indicator.evaluate(&[]), None);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // EMA = 0.5 * 501 + 0.5 * 499 = 500, distance = 1 / 500 = 0.002 exactly.
        let indicator = EmaProximity::new(params(1));
        let verdict = indicator.evaluate(&bars(&[499.0, 499.0, 499.0, 501.0])).unwrap();

        assert_eq!(verdict.distance_ratio, 0.002);
        assert_eq!(verdict.indicator_value, 500.0);
        assert_eq!(verdict.close, 501.0);
        assert_eq!(verdict.direction, Direction::Long);
    }

    #[test]
    fn test_beyond_threshold_is_none() {
        let indicator = EmaProximity::new(params(1));
        assert_eq!(indicator.evaluate(&bars(&[499.0, 499.0, 499.0, 501.02])), None);
        assert_eq!(indicator.evaluate(&bars(&[100.0, 100.0, 100.0, 120.0])), None);
    }

    #[test]
    fn test_short_when_lookback_mean_below_ema() {
        let indicator = EmaProximity::new(params(1));
        let verdict = indicator.evaluate(&bars(&[501.0, 501.0, 501.0, 499.0])).unwrap();

        assert_eq!(verdict.direction, Direction::Short);
        assert_eq!(verdict.indicator_value, 500.0);
    }

    #[test]
    fn test_lookback_mean_equal_to_ema_is_none() {
        // mean(499, 501) == 500 == EMA
        let indicator = EmaProximity::new(params(2));
        assert_eq!(indicator.evaluate(&bars(&[499.0, 499.0, 499.0, 501.0])), None);
    }

    #[test]
    fn test_lookback_longer_than_window_uses_whole_window() {
        let indicator = EmaProximity::new(params(100));
        let verdict = indicator.evaluate(&bars(&[501.0, 501.0, 501.0, 499.0])).unwrap();
        // mean = 500.5 > 500
        assert_eq!(verdict.direction, Direction::Long);
    }

    #[test]
    fn test_signal_fires_with_chart() {
        let key = SeriesKey::new("BTCUSDT", "15m");
        let mut signal = EmaProximitySignal::new(params(1));
        signal.install(key.clone(), bars(&[499.0, 499.0, 499.0]));

        let next = Candle::from_millis(3 * 900_000, 499.0, 501.5, 498.5, 501.0, 1.0).unwrap();
        let event = signal.evaluate(&key, next).unwrap();

        assert_eq!(event.indicator, "EMA3");
        assert_eq!(event.verdict.direction, Direction::Long);
        let png = event.chart.expect("chart rendered");
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_chart_failure_still_fires_text_only() {
        fn broken(_: &[Candle], _: &[f64]) -> Result<Vec<u8>, chart::RenderError> {
            Err(chart::RenderError::Draw("backend unavailable".to_string()))
        }

        let key = SeriesKey::new("BTCUSDT", "15m");
        let mut signal = EmaProximitySignal::new(params(1)).with_renderer(broken);
        signal.install(key.clone(), bars(&[499.0, 499.0, 499.0]));

        let next = Candle::from_millis(3 * 900_000, 499.0, 501.5, 498.5, 501.0, 1.0).unwrap();
        let event = signal.evaluate(&key, next).unwrap();

        assert!(event.chart.is_none());
        assert_eq!(event.key, key);
        assert_eq!(event.verdict.direction, Direction::Long);
        assert_eq!(event.verdict.indicator_value, 500.0);
        assert_eq!(event.verdict.distance_ratio, 0.002);
        assert_eq!(event.verdict.close, 501.0);
    }

    #[test]
    fn test_signal_without_history_fails_closed() {
        let mut signal = EmaProximitySignal::new(params(1));
        let candle = bars(&[501.0])[0];
        assert!(signal.evaluate(&SeriesKey::new("BTCUSDT", "1h"), candle).is_none());
    }

    #[test]
    fn test_stale_bar_is_dropped() {
        let key = SeriesKey::new("BTCUSDT", "15m");
        let mut signal = EmaProximitySignal::new(params(1));
        signal.install(key.clone(), bars(&[499.0, 499.0, 499.0, 499.0]));

        // Same open time as the second bar, with a close that would otherwise fire.
        let stale = bars(&[0.0, 501.0])[1];
        assert!(signal.evaluate(&key, stale).is_none());

        let series = signal.store().get(&key).unwrap();
        assert_eq!(series.len(), 4);
        assert!(series.candles().iter().all(|c| c.close == 499.0));
    }
}
