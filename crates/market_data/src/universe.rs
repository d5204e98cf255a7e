use std::collections::HashMap;

use common::models::{MarketInfo, Ticker};

const QUOTE_ASSET: &str = "USDT";

/// Picks the `top_n` active USDT-quoted perpetual contracts by descending
/// 24h quote volume. Ties keep the exchange's market order.
pub fn select_top_symbols(
    markets: &[MarketInfo],
    tickers: &HashMap<String, Ticker>,
    top_n: usize,
) -> Vec<String> {
    let mut candidates: Vec<(&MarketInfo, f64)> = markets
        .iter()
        .filter(|m| m.quote == QUOTE_ASSET && m.active && m.is_contract && m.is_perpetual)
        .map(|m| {
            let volume = tickers.get(&m.id).map(|t| t.quote_volume).unwrap_or(0.0);
            (m, volume)
        })
        .collect();

    // sort_by is stable
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    candidates
        .into_iter()
        .take(top_n)
        .map(|(m, _)| m.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id: &str, quote: &str, active: bool, perpetual: bool) -> MarketInfo {
        MarketInfo {
            id: id.to_string(),
            symbol: format!("{}/{}:{}", id.trim_end_matches(quote), quote, quote),
            base: id.trim_end_matches(quote).to_string(),
            quote: quote.to_string(),
            active,
            is_contract: true,
            is_perpetual: perpetual,
        }
    }

    fn tickers(pairs: &[(&str, f64)]) -> HashMap<String, Ticker> {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), Ticker { quote_volume: *v }))
            .collect()
    }

    #[test]
    fn test_top_by_quote_volume() {
        let markets = vec![
            market("ETHUSDT", "USDT", true, true),
            market("BTCUSDT", "USDT", true, true),
            market("SOLUSDT", "USDT", true, true),
        ];
        let tickers = tickers(&[("BTCUSDT", 900.0), ("ETHUSDT", 500.0), ("SOLUSDT", 100.0)]);

        assert_eq!(select_top_symbols(&markets, &tickers, 2), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_filters_non_usdt_inactive_and_dated() {
        let markets = vec![
            market("BTCUSDC", "USDC", true, true),
            market("LUNAUSDT", "USDT", false, true),
            market("ETHUSDT", "USDT", true, false),
            market("XRPUSDT", "USDT", true, true),
        ];
        let tickers = tickers(&[("BTCUSDC", 9e9), ("LUNAUSDT", 9e9), ("ETHUSDT", 9e9), ("XRPUSDT", 1.0)]);

        assert_eq!(select_top_symbols(&markets, &tickers, 5), vec!["XRPUSDT"]);
    }

    #[test]
    fn test_ties_and_missing_tickers_keep_market_order() {
        let markets = vec![
            market("AAAUSDT", "USDT", true, true),
            market("BBBUSDT", "USDT", true, true),
            market("CCCUSDT", "USDT", true, true),
            market("DDDUSDT", "USDT", true, true),
        ];
        // DDD has no ticker and ranks as zero volume.
        let tickers = tickers(&[("AAAUSDT", 10.0), ("BBBUSDT", 50.0), ("CCCUSDT", 10.0)]);

        assert_eq!(
            select_top_symbols(&markets, &tickers, 4),
            vec!["BBBUSDT", "AAAUSDT", "CCCUSDT", "DDDUSDT"]
        );
    }
}
