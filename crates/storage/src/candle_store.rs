use std::collections::HashMap;

use common::models::{Candle, SeriesKey};
use market_data::{ExchangeError, HistorySource};
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Appended,
    /// The in-progress bar was corrected in place.
    Replaced,
    /// Older than the newest stored bar; nothing changed.
    Stale,
}

/// Bounded series of candles with strictly increasing open times.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    limit: usize,
}

impl CandleSeries {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            candles: Vec::with_capacity(limit + 1),
            limit,
        }
    }

    pub fn from_history(history: impl IntoIterator<Item = Candle>, limit: usize) -> Self {
        let mut series = Self::new(limit);
        for candle in history {
            series.upsert(candle);
        }
        series
    }

    pub fn upsert(&mut self, candle: Candle) -> UpsertOutcome {
        let outcome = match self.candles.last_mut() {
            Some(last) if candle.open_time < last.open_time => return UpsertOutcome::Stale,
            Some(last) if candle.open_time == last.open_time => {
                *last = candle;
                UpsertOutcome::Replaced
            }
            _ => {
                self.candles.push(candle);
                UpsertOutcome::Appended
            }
        };

        if self.candles.len() > self.limit {
            let excess = self.candles.len() - self.limit;
            self.candles.drain(..excess);
        }
        outcome
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Read-only view handed back by [`CandleStore::upsert`].
#[derive(Debug)]
pub struct Window<'a> {
    pub outcome: UpsertOutcome,
    pub candles: &'a [Candle],
}

#[derive(Debug, Error)]
#[error("failed to preload {key}: {source}")]
pub struct PreloadError {
    pub key: SeriesKey,
    #[source]
    pub source: ExchangeError,
}

#[derive(Debug, Default)]
pub struct PreloadReport {
    pub loaded: Vec<SeriesKey>,
    pub failed: Vec<PreloadError>,
}

/// Memory-resident candle cache, one series per (symbol, interval).
///
/// Single writer: the signal engine task is the only caller of the mutating
/// methods, so nothing here is locked.
#[derive(Debug)]
pub struct CandleStore {
    series: HashMap<SeriesKey, CandleSeries>,
    limit: usize,
}

impl CandleStore {
    pub fn new(limit: usize) -> Self {
        Self {
            series: HashMap::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn install(&mut self, key: SeriesKey, history: Vec<Candle>) -> &CandleSeries {
        let series = CandleSeries::from_history(history, self.limit);
        self.series.insert(key.clone(), series);
        &self.series[&key]
    }

    /// Applies one incoming bar. `None` when the key was never loaded.
    pub fn upsert(&mut self, key: &SeriesKey, candle: Candle) -> Option<Window<'_>> {
        let series = self.series.get_mut(key)?;
        let outcome = series.upsert(candle);
        Some(Window {
            outcome,
            candles: series.candles(),
        })
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&CandleSeries> {
        self.series.get(key)
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.series.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Fetches history for every (symbol, interval). A failing key is logged
    /// and left absent; the others still load.
    pub async fn preload(
        &mut self,
        history: &dyn HistorySource,
        symbols: &[String],
        intervals: &[String],
    ) -> PreloadReport {
        let mut report = PreloadReport::default();

        for symbol in symbols {
            for interval in intervals {
                let key = SeriesKey::new(symbol.as_str(), interval.as_str());
                match history.fetch_ohlcv(symbol, interval, self.limit).await {
                    Ok(candles) => {
                        let series = self.install(key.clone(), candles);
                        info!("Preloaded {} candles for {}", series.len(), key);
                        report.loaded.push(key);
                    }
                    Err(source) => {
                        let err = PreloadError { key, source };
                        error!("Error preloading: {}", err);
                        report.failed.push(err);
                    }
                }
            }
        }

        report
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}
