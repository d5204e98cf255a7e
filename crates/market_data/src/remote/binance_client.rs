use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::config::ExchangeSettings;
use common::models::{Candle, MarketInfo, Ticker};
use reqwest::{Client, Proxy, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::remote::{ExchangeInfoResponse, KlineRow, TickerResponse, get_rest_base_url};
use crate::traits::{ExchangeError, HistorySource, MarketCatalog, RemoteResponse};

/// Request/response handle to the USDⓈ-M futures REST API.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BinanceClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        let mut builder = Client::builder()
            .user_agent("ema_signal_bot/0.1.0")
            .timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &settings.proxy_url {
            info!("Routing Binance REST requests through proxy");
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: get_rest_base_url(&settings.tld),
            api_key: settings.api_key.clone(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        if self.api_key.is_empty() {
            request
        } else {
            request.header("X-MBX-APIKEY", &self.api_key)
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ExchangeError> {
        let resp = request.send().await?;

        let status = resp.status();
        if let Some(used_weight) = resp
            .headers()
            .get("x-mbx-used-weight-1m")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
        {
            if used_weight > 1000 {
                warn!("High API weight usage: {}", used_weight);
            } else {
                debug!("Used weights: {}/2400", used_weight);
            }
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Binance request failed ({}): {}", status, body);
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl MarketCatalog for BinanceClient {
    async fn load_markets(&self) -> Result<Vec<MarketInfo>, ExchangeError> {
        let info: ExchangeInfoResponse = self.send(self.get("/fapi/v1/exchangeInfo")).await?;
        info.symbols.iter().map(|s| s.to_model()).collect()
    }

    async fn fetch_tickers(&self) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let tickers: Vec<TickerResponse> = self.send(self.get("/fapi/v1/ticker/24hr")).await?;

        let mut result = HashMap::with_capacity(tickers.len());
        for ticker in &tickers {
            match ticker.to_model() {
                Ok(t) => {
                    result.insert(ticker.symbol.clone(), t);
                }
                Err(e) => warn!("Skipping ticker {}: {}", ticker.symbol, e),
            }
        }
        Ok(result)
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        // Pooled connections are released when the last client clone drops.
        info!("Binance REST client closed");
        Ok(())
    }
}

#[async_trait]
impl HistorySource for BinanceClient {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = limit.to_string();
        let request = self.get("/fapi/v1/klines").query(&[
            ("symbol", symbol),
            ("interval", interval),
            ("limit", limit.as_str()),
        ]);

        let rows: Vec<KlineRow> = self.send(request).await?;
        rows.iter().map(|row| row.to_model()).collect()
    }
}
