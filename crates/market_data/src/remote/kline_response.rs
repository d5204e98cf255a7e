use common::models::Candle;
use serde::Deserialize;
use serde_json::Value;

use crate::traits::{ExchangeError, RemoteResponse};

/// Envelope of a combined-stream message.
#[derive(Deserialize, Debug)]
pub struct RawStreamEvent {
    pub stream: String,
    pub data: Value, // Delay parsing this until we know what it is!
}

#[derive(Deserialize, Debug)]
pub struct KlineStreamEvent {
    #[serde(rename(deserialize = "k"))]
    pub data: KlineEvent,
}

#[derive(Deserialize, Debug)]
pub struct KlineEvent {
    #[serde(rename(deserialize = "s"))]
    pub symbol: String,
    #[serde(rename(deserialize = "t"))]
    pub start_time: i64,
    #[serde(rename(deserialize = "i"))]
    pub interval: String,
    #[serde(rename(deserialize = "o"))]
    pub open_price: String,
    #[serde(rename(deserialize = "c"))]
    pub close_price: String,
    #[serde(rename(deserialize = "h"))]
    pub high_price: String,
    #[serde(rename(deserialize = "l"))]
    pub low_price: String,
    #[serde(rename(deserialize = "v"))]
    pub volume: String,
}

impl RawStreamEvent {
    pub fn is_kline(&self) -> bool {
        self.stream.contains("@kline")
    }
}

impl RemoteResponse<(String, String, Candle)> for KlineStreamEvent {
    fn to_model(&self) -> Result<(String, String, Candle), ExchangeError> {
        let k = &self.data;
        let candle = candle_from_parts(
            k.start_time,
            [&k.open_price, &k.high_price, &k.low_price, &k.close_price, &k.volume],
        )?;
        Ok((k.symbol.clone(), k.interval.clone(), candle))
    }
}

/// One row of `GET /fapi/v1/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
#[derive(Deserialize, Debug)]
#[serde(transparent)]
pub struct KlineRow(pub Vec<Value>);

impl RemoteResponse<Candle> for KlineRow {
    fn to_model(&self) -> Result<Candle, ExchangeError> {
        if self.0.len() < 6 {
            return Err(ExchangeError::Decode(format!(
                "kline row has {} fields, expected at least 6",
                self.0.len()
            )));
        }

        let open_time = self.0[0]
            .as_i64()
            .ok_or_else(|| ExchangeError::Decode(format!("bad kline open time: {}", self.0[0])))?;

        let mut prices = [""; 5];
        for (slot, value) in prices.iter_mut().zip(&self.0[1..6]) {
            *slot = value
                .as_str()
                .ok_or_else(|| ExchangeError::Decode(format!("bad kline price: {}", value)))?;
        }

        candle_from_parts(open_time, prices)
    }
}

fn candle_from_parts<S: AsRef<str>>(open_time: i64, fields: [S; 5]) -> Result<Candle, ExchangeError> {
    let mut values = [0_f64; 5];
    for (value, raw) in values.iter_mut().zip(fields.iter()) {
        *value = raw
            .as_ref()
            .parse::<f64>()
            .map_err(|e| ExchangeError::Decode(format!("bad kline number '{}': {}", raw.as_ref(), e)))?;
    }
    let [open, high, low, close, volume] = values;

    Candle::from_millis(open_time, open, high, low, close, volume)
        .ok_or_else(|| ExchangeError::Decode(format!("kline open time out of range: {}", open_time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_row_to_candle() {
        let json = r#"[1499040000000,"0.01634790","0.80000000","0.01575800","0.01577100",
                       "148976.11427815",1499644799999,"2434.19055334",308,"1756.87402397","28.46694368","0"]"#;
        let row: KlineRow = serde_json::from_str(json).unwrap();
        let candle = row.to_model().unwrap();

        assert_eq!(candle.open_time.timestamp_millis(), 1499040000000);
        assert_eq!(candle.open, 0.0163479);
        assert_eq!(candle.high, 0.8);
        assert_eq!(candle.low, 0.015758);
        assert_eq!(candle.close, 0.015771);
        assert_eq!(candle.volume, 148976.11427815);
    }

    #[test]
    fn test_short_rest_row_is_rejected() {
        let row: KlineRow = serde_json::from_str(r#"[1499040000000,"1.0"]"#).unwrap();
        assert!(matches!(row.to_model(), Err(ExchangeError::Decode(_))));
    }

    #[test]
    fn test_stream_event_to_candle() {
        let json = r#"{
            "stream": "btcusdt@kline_15m",
            "data": {
                "e": "kline", "E": 1638747660000, "s": "BTCUSDT",
                "k": {
                    "t": 1638747600000, "T": 1638748499999, "s": "BTCUSDT", "i": "15m",
                    "f": 100, "L": 200, "o": "49000.10", "c": "49100.00", "h": "49150.00",
                    "l": "48990.00", "v": "12.5", "n": 100, "x": false, "q": "1.0",
                    "V": "5.0", "Q": "0.5", "B": "0"
                }
            }
        }"#;

        let raw: RawStreamEvent = serde_json::from_str(json).unwrap();
        assert!(raw.is_kline());

        let event: KlineStreamEvent = serde_json::from_value(raw.data).unwrap();
        let (symbol, interval, candle) = event.to_model().unwrap();

        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(interval, "15m");
        assert_eq!(candle.open_time.timestamp_millis(), 1638747600000);
        assert_eq!(candle.close, 49100.0);
        assert_eq!(candle.high, 49150.0);
    }
}
