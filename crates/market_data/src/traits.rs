use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use common::models::{Candle, MarketInfo, Ticker};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("stream closed by remote")]
    Closed,
    #[error("no subscriptions requested")]
    NoSubscriptions,
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Decode(e.to_string())
    }
}

/// Converts a raw exchange payload into a domain model.
pub trait RemoteResponse<T> {
    fn to_model(&self) -> Result<T, ExchangeError>;
}

/// One live candle subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    pub symbol: String,
    pub interval: String,
}

/// `symbol -> interval -> candles`, oldest first.
pub type FeedBatch = BTreeMap<String, BTreeMap<String, Vec<Candle>>>;

#[async_trait]
pub trait MarketCatalog: Send + Sync {
    /// All markets in the exchange's natural order.
    async fn load_markets(&self) -> Result<Vec<MarketInfo>, ExchangeError>;

    /// 24h tickers keyed by market id.
    async fn fetch_tickers(&self) -> Result<HashMap<String, Ticker>, ExchangeError>;

    /// Releases request/response resources.
    async fn close(&self) -> Result<(), ExchangeError> {
        Ok(())
    }
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;
}

#[async_trait]
pub trait CandleFeed: Send {
    /// Waits for the next batch of candle updates covering `subscriptions`.
    async fn watch(&mut self, subscriptions: &[Subscription]) -> Result<FeedBatch, ExchangeError>;

    async fn close(&mut self) -> Result<(), ExchangeError>;
}
