use std::env;

pub mod binance_client;
pub mod exchange_info_response;
pub mod kline_response;
pub mod ticker_response;

pub use binance_client::BinanceClient;
pub use exchange_info_response::{ExchangeInfoResponse, SymbolInfo};
pub use kline_response::{KlineRow, KlineStreamEvent, RawStreamEvent};
pub use ticker_response::TickerResponse;

pub fn get_rest_base_url(tld: &str) -> String {
    env::var("BINANCE_FAPI_URL").unwrap_or_else(|_| format!("https://fapi.binance.{}", tld))
}

pub fn get_ws_base_url(tld: &str) -> String {
    env::var("BINANCE_FSTREAM_URL")
        .unwrap_or_else(|_| format!("wss://fstream.binance.{}/stream?streams=", tld))
}
