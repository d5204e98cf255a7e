use async_trait::async_trait;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::remote::{KlineStreamEvent, RawStreamEvent, get_ws_base_url};
use crate::traits::{CandleFeed, ExchangeError, FeedBatch, RemoteResponse, Subscription};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_BATCH_MESSAGES: usize = 256;

/// Live kline feed over the Binance futures combined stream.
///
/// The socket is opened lazily on the first `watch` and dropped on any error,
/// so the next `watch` reconnects.
pub struct KlineFeed {
    base_url: String,
    connection: Option<(String, WsStream)>,
}

impl KlineFeed {
    pub fn new(tld: &str) -> Self {
        Self::with_base_url(get_ws_base_url(tld))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connection: None,
        }
    }

    pub fn stream_url(&self, subscriptions: &[Subscription]) -> String {
        let streams: Vec<String> = subscriptions
            .iter()
            .map(|s| format!("{}@kline_{}", s.symbol.to_lowercase(), s.interval))
            .collect();
        format!("{}{}", self.base_url, streams.join("/"))
    }

    async fn connected(&mut self, subscriptions: &[Subscription]) -> Result<&mut WsStream, ExchangeError> {
        if subscriptions.is_empty() {
            return Err(ExchangeError::NoSubscriptions);
        }

        let url = self.stream_url(subscriptions);
        let reuse = matches!(&self.connection, Some((current, _)) if *current == url);
        if !reuse {
            info!("Connecting to kline stream with {} subscriptions", subscriptions.len());
            debug!("Stream url: {}", url);
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
            self.connection = Some((url, ws_stream));
        }

        match self.connection.as_mut() {
            Some((_, stream)) => Ok(stream),
            None => Err(ExchangeError::Closed),
        }
    }

    /// Handles one websocket message, adding any kline it carries to `batch`.
    async fn handle_message(
        stream: &mut WsStream,
        message: Message,
        batch: &mut FeedBatch,
    ) -> Result<(), ExchangeError> {
        match message {
            Message::Text(text) => {
                match Self::parse_kline(text.as_str()) {
                    Ok(Some((symbol, interval, candle))) => {
                        batch
                            .entry(symbol)
                            .or_default()
                            .entry(interval)
                            .or_default()
                            .push(candle);
                    }
                    Ok(None) => debug!("Ignoring non-kline stream message"),
                    Err(e) => warn!("Unknown socket response: {}", e),
                }
                Ok(())
            }
            Message::Ping(payload) => {
                stream.send(Message::Pong(payload)).await?;
                debug!("Ping - Pong message sent to websocket.");
                Ok(())
            }
            Message::Close(frame) => {
                debug!("Close message received: {:?}", frame);
                Err(ExchangeError::Closed)
            }
            _ => Ok(()),
        }
    }

    fn parse_kline(json_input: &str) -> Result<Option<(String, String, common::models::Candle)>, ExchangeError> {
        let raw_event: RawStreamEvent = serde_json::from_str(json_input)?;
        if !raw_event.is_kline() {
            return Ok(None);
        }
        let event = serde_json::from_value::<KlineStreamEvent>(raw_event.data)?;
        event.to_model().map(Some)
    }

    async fn collect_batch(stream: &mut WsStream) -> Result<FeedBatch, ExchangeError> {
        let mut batch = FeedBatch::new();

        // Block until at least one kline arrives.
        while batch.is_empty() {
            match stream.next().await {
                Some(message) => Self::handle_message(stream, message?, &mut batch).await?,
                None => return Err(ExchangeError::Closed),
            }
        }

        // Then take whatever is already buffered without waiting. A failure here
        // still hands back the klines collected so far; the next watch reports it.
        for _ in 0..MAX_BATCH_MESSAGES {
            let drained = match stream.next().now_or_never() {
                Some(Some(Ok(message))) => Self::handle_message(stream, message, &mut batch).await,
                Some(Some(Err(e))) => Err(e.into()),
                Some(None) => Err(ExchangeError::Closed),
                None => break,
            };
            if let Err(e) = drained {
                debug!("Stream failed behind a pending batch: {}", e);
                break;
            }
        }

        Ok(batch)
    }
}

#[async_trait]
impl CandleFeed for KlineFeed {
    async fn watch(&mut self, subscriptions: &[Subscription]) -> Result<FeedBatch, ExchangeError> {
        let stream = self.connected(subscriptions).await?;
        let result = Self::collect_batch(stream).await;
        if result.is_err() {
            self.connection = None;
        }
        result
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some((_, mut stream)) = self.connection.take() {
            stream.close(None).await?;
            info!("Kline stream closed");
        }
        Ok(())
    }
}
