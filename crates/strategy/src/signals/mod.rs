use async_trait::async_trait;
use common::models::{Candle, SeriesKey, Verdict};
use market_data::HistorySource;
use storage::PreloadReport;

pub mod ema_proximity;

pub use ema_proximity::{EmaProximity, EmaProximityParams, EmaProximitySignal};

/// A fired signal for one series, ready to be turned into an alert.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub key: SeriesKey,
    /// Short indicator label, e.g. `EMA200`.
    pub indicator: String,
    pub verdict: Verdict,
    /// PNG chart; `None` when rendering failed.
    pub chart: Option<Vec<u8>>,
}

/// A signal owns its candle history and decides, bar by bar, whether to fire.
#[async_trait]
pub trait Signal: Send {
    fn name(&self) -> &str;

    /// Loads the initial history for every (symbol, interval).
    async fn preload(
        &mut self,
        history: &dyn HistorySource,
        symbols: &[String],
        intervals: &[String],
    ) -> PreloadReport;

    /// Applies `candle` to the series for `key` and evaluates it.
    fn evaluate(&mut self, key: &SeriesKey, candle: Candle) -> Option<SignalEvent>;
}
