use common::models::Ticker;
use serde::Deserialize;

use crate::traits::{ExchangeError, RemoteResponse};

#[derive(Deserialize, Debug)]
pub struct TickerResponse {
    pub symbol: String,
    #[serde(rename(deserialize = "quoteVolume"))]
    pub quote_volume: String,
}

impl RemoteResponse<Ticker> for TickerResponse {
    fn to_model(&self) -> Result<Ticker, ExchangeError> {
        let quote_volume = self.quote_volume.parse::<f64>().map_err(|e| {
            ExchangeError::Decode(format!("quoteVolume for {}: {}", self.symbol, e))
        })?;
        Ok(Ticker { quote_volume })
    }
}
