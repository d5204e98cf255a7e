use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use common::clock::{Clock, SystemClock};
use common::config::Config;
use common::models::{Alert, SeriesKey};
use market_data::universe::select_top_symbols;
use market_data::{CandleFeed, ExchangeError, FeedBatch, HistorySource, MarketCatalog};
use storage::SymbolTable;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::alert::{compose_alert, compose_universe_notice};
use crate::signals::Signal;
use crate::throttle::AlertThrottle;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    LoadingSymbols,
    PreloadingHistory,
    Streaming,
    Closing,
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Init => "INIT",
            EngineState::LoadingSymbols => "LOADING_SYMBOLS",
            EngineState::PreloadingHistory => "PRELOADING_HISTORY",
            EngineState::Streaming => "STREAMING",
            EngineState::Closing => "CLOSING",
            EngineState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Failures that stop the engine before it can stream.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load markets: {0}")]
    Markets(#[source] ExchangeError),
    #[error("failed to fetch tickers: {0}")]
    Tickers(#[source] ExchangeError),
    #[error("no tradable USDT perpetual contracts found")]
    EmptyUniverse,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub top_symbols: usize,
    pub intervals: Vec<String>,
    pub chat_id: i64,
    pub log_chat_id: Option<i64>,
    pub timezone: Tz,
    pub reconnect_delay: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_symbols: config.top_symbols,
            intervals: config.intervals.clone(),
            chat_id: config.telegram.chat_id,
            log_chat_id: config.telegram.log_peer_id,
            timezone: config.timezone,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Drives preload, streaming, evaluation, throttling and alert hand-off.
///
/// A single task owns the engine, so the candle cache and the throttle are
/// only ever touched sequentially, one feed batch at a time.
pub struct SignalEngine<R, F> {
    exchange: R,
    feed: F,
    signal: Box<dyn Signal>,
    throttle: AlertThrottle,
    symbols: SymbolTable,
    settings: EngineSettings,
    alert_tx: mpsc::UnboundedSender<Alert>,
    clock: Arc<dyn Clock>,
    state: EngineState,
}

impl<R, F> SignalEngine<R, F>
where
    R: MarketCatalog + HistorySource,
    F: CandleFeed,
{
    pub fn new(
        exchange: R,
        feed: F,
        signal: Box<dyn Signal>,
        settings: EngineSettings,
        alert_tx: mpsc::UnboundedSender<Alert>,
    ) -> Self {
        Self {
            exchange,
            feed,
            signal,
            throttle: AlertThrottle::new(),
            symbols: SymbolTable::default(),
            settings,
            alert_tx,
            clock: Arc::new(SystemClock),
            state: EngineState::Init,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn throttle(&self) -> &AlertThrottle {
        &self.throttle
    }

    fn transition(&mut self, next: EngineState) {
        info!("Signal engine {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs until `shutdown` flips, then releases the exchange handles.
    /// Only a failure to establish the symbol universe is returned.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        let result = self.start_and_stream(&mut shutdown).await;
        if let Err(e) = &result {
            error!("Signal engine failed: {}", e);
        }
        self.close().await;
        result
    }

    /// Startup steps race the shutdown flag, so an interrupt during a slow
    /// preload goes straight to closing.
    async fn start_and_stream(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), EngineError> {
        if *shutdown.borrow() {
            return Ok(());
        }

        tokio::select! {
            _ = shutdown.changed() => {
                info!("Shutdown requested while loading symbols");
                return Ok(());
            }
            loaded = self.load_symbols() => loaded?,
        }

        tokio::select! {
            _ = shutdown.changed() => {
                info!("Shutdown requested while preloading history");
                return Ok(());
            }
            _ = self.preload_history() => {}
        }

        self.stream(shutdown).await;
        Ok(())
    }

    pub async fn load_symbols(&mut self) -> Result<(), EngineError> {
        self.transition(EngineState::LoadingSymbols);

        let markets = self.exchange.load_markets().await.map_err(EngineError::Markets)?;
        let tickers = self.exchange.fetch_tickers().await.map_err(EngineError::Tickers)?;

        let tracked = select_top_symbols(&markets, &tickers, self.settings.top_symbols);
        if tracked.is_empty() {
            return Err(EngineError::EmptyUniverse);
        }
        info!("Loaded top {} symbols: {:?}", tracked.len(), tracked);
        self.symbols = SymbolTable::new(&markets, tracked);

        if let Some(chat_id) = self.settings.log_chat_id {
            let notice = compose_universe_notice(chat_id, self.symbols.tracked(), &self.settings.intervals);
            self.queue(notice);
        }
        Ok(())
    }

    pub async fn preload_history(&mut self) {
        self.transition(EngineState::PreloadingHistory);

        let report = self
            .signal
            .preload(&self.exchange, self.symbols.tracked(), &self.settings.intervals)
            .await;

        if report.failed.is_empty() {
            info!("{}: preloaded {} series", self.signal.name(), report.loaded.len());
        } else {
            warn!(
                "{}: preloaded {} series, {} failed and will stay silent",
                self.signal.name(),
                report.loaded.len(),
                report.failed.len()
            );
        }
    }

    async fn stream(&mut self, shutdown: &mut watch::Receiver<bool>) {
        self.transition(EngineState::Streaming);
        let subscriptions = self.symbols.subscriptions(&self.settings.intervals);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown.changed() => None,
                batch = self.feed.watch(&subscriptions) => Some(batch),
            };

            match next {
                None => break,
                Some(Ok(batch)) => {
                    self.process_batch(batch);
                }
                Some(Err(e)) => {
                    error!(
                        "watch candles error: {}. Retrying in {:?}...",
                        e, self.settings.reconnect_delay
                    );
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = time::sleep(self.settings.reconnect_delay) => {}
                    }
                }
            }
        }
        info!("Shutdown requested, leaving stream loop");
    }

    /// Evaluates the newest bar of every (symbol, interval) in `batch`.
    /// Returns how many alerts were queued.
    pub fn process_batch(&mut self, batch: FeedBatch) -> usize {
        let now = self.clock.now();
        let mut emitted = 0;

        for (symbol, intervals) in batch {
            let Some(symbol_id) = self.symbols.resolve(&symbol).map(str::to_string) else {
                debug!("Ignoring untracked symbol {}", symbol);
                continue;
            };

            for (interval, candles) in intervals {
                let Some(candle) = candles.last().copied() else {
                    continue;
                };
                let key = SeriesKey::new(symbol_id.as_str(), interval);

                let Some(event) = self.signal.evaluate(&key, candle) else {
                    continue;
                };

                if !self.throttle.should_emit(&key, now) {
                    debug!("Signal for {} suppressed by throttle", key);
                    continue;
                }
                self.throttle.record_emit(&key, now);

                let alert = compose_alert(event, self.settings.chat_id, self.settings.timezone, now);
                info!("{}", alert.title);
                self.queue(alert);
                emitted += 1;
            }
        }

        emitted
    }

    fn queue(&self, alert: Alert) {
        if self.alert_tx.send(alert).is_err() {
            warn!("Notification queue closed, alert dropped");
        }
    }

    /// Releases both exchange handles; a failure on one does not skip the other.
    pub async fn close(&mut self) {
        self.transition(EngineState::Closing);

        if let Err(e) = self.feed.close().await {
            error!("Failed to close candle feed: {}", e);
        }
        if let Err(e) = self.exchange.close().await {
            error!("Failed to close exchange client: {}", e);
        }

        self.transition(EngineState::Closed);
        info!("Exchange connection closed cleanly.");
    }
}
