use std::collections::HashMap;

use common::models::MarketInfo;
use market_data::Subscription;

/// Tracked universe plus the translation from human readable symbols
/// (`BTC/USDT:USDT`) to exchange ids (`BTCUSDT`).
///
/// Built once at startup; the key space never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_symbol: HashMap<String, String>,
    tracked: Vec<String>,
}

impl SymbolTable {
    pub fn new(markets: &[MarketInfo], tracked: Vec<String>) -> Self {
        let by_symbol = markets
            .iter()
            .map(|m| (m.symbol.clone(), m.id.clone()))
            .collect();
        Self { by_symbol, tracked }
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Maps a feed symbol (unified name or exchange id) to a tracked id.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let id = self.by_symbol.get(name).map(String::as_str).unwrap_or(name);
        self.tracked.iter().find(|t| *t == id).map(String::as_str)
    }

    /// Cartesian product of tracked symbols and `intervals`.
    pub fn subscriptions(&self, intervals: &[String]) -> Vec<Subscription> {
        self.tracked
            .iter()
            .flat_map(|symbol| {
                intervals.iter().map(move |interval| Subscription {
                    symbol: symbol.clone(),
                    interval: interval.clone(),
                })
            })
            .collect()
    }
}
