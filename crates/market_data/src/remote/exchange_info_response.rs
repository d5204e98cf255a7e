use common::models::MarketInfo;
use serde::Deserialize;

use crate::traits::{ExchangeError, RemoteResponse};

#[derive(Deserialize, Debug)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize, Debug)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(rename(deserialize = "contractType"), default)]
    pub contract_type: String,
    pub status: String,
    #[serde(rename(deserialize = "baseAsset"))]
    pub base_asset: String,
    #[serde(rename(deserialize = "quoteAsset"))]
    pub quote_asset: String,
}

impl RemoteResponse<MarketInfo> for SymbolInfo {
    fn to_model(&self) -> Result<MarketInfo, ExchangeError> {
        let is_perpetual = self.contract_type == "PERPETUAL";
        // Unified naming: perpetuals settle in the quote asset.
        let symbol = if is_perpetual {
            format!("{}/{}:{}", self.base_asset, self.quote_asset, self.quote_asset)
        } else {
            format!("{}/{}", self.base_asset, self.quote_asset)
        };

        Ok(MarketInfo {
            id: self.symbol.clone(),
            symbol,
            base: self.base_asset.clone(),
            quote: self.quote_asset.clone(),
            active: self.status == "TRADING",
            is_contract: true,
            is_perpetual,
        })
    }
}
