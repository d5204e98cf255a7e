/// Exchange market metadata used to pick the tracked universe.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInfo {
    /// Exchange identifier, e.g. `BTCUSDT`.
    pub id: String,
    /// Human readable unified symbol, e.g. `BTC/USDT:USDT`.
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub active: bool,
    pub is_contract: bool,
    pub is_perpetual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ticker {
    pub quote_volume: f64,
}
