use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use common::interval;
use common::models::SeriesKey;
use tracing::warn;

/// At most one alert per (symbol, interval) per interval period.
///
/// Entries are never evicted: the key space is fixed at startup, so the map
/// is bounded by the tracked universe.
#[derive(Debug, Default)]
pub struct AlertThrottle {
    last_emit: HashMap<SeriesKey, DateTime<Utc>>,
}

impl AlertThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_emit(&self, key: &SeriesKey, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_emit.get(key) else {
            return true;
        };

        match interval::to_seconds(&key.interval) {
            Ok(seconds) => {
                let period = i64::try_from(seconds)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .unwrap_or(TimeDelta::MAX);
                now - *last >= period
            }
            Err(e) => {
                warn!("Suppressing alert for {}: {}", key, e);
                false
            }
        }
    }

    /// Must be called right after a permitted emission.
    pub fn record_emit(&mut self, key: &SeriesKey, now: DateTime<Utc>) {
        self.last_emit.insert(key.clone(), now);
    }

    pub fn last_emit(&self, key: &SeriesKey) -> Option<DateTime<Utc>> {
        self.last_emit.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_emit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emit.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_alert_is_permitted() {
        let throttle = AlertThrottle::new();
        assert!(throttle.should_emit(&SeriesKey::new("BTCUSDT", "15m"), t0()));
    }

    #[test]
    fn test_one_alert_per_interval() {
        let key = SeriesKey::new("BTCUSDT", "15m");
        let mut throttle = AlertThrottle::new();
        throttle.record_emit(&key, t0());

        assert!(!throttle.should_emit(&key, t0() + TimeDelta::seconds(899)));
        assert!(!throttle.should_emit(&key, t0() + TimeDelta::milliseconds(899_999)));
        assert!(throttle.should_emit(&key, t0() + TimeDelta::seconds(900)));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut throttle = AlertThrottle::new();
        throttle.record_emit(&SeriesKey::new("BTCUSDT", "15m"), t0());

        let later = t0() + TimeDelta::seconds(60);
        assert!(throttle.should_emit(&SeriesKey::new("BTCUSDT", "1h"), later));
        assert!(throttle.should_emit(&SeriesKey::new("ETHUSDT", "15m"), later));
    }

    #[test]
    fn test_record_overwrites_previous_emission() {
        let key = SeriesKey::new("ETHUSDT", "1h");
        let mut throttle = AlertThrottle::new();
        throttle.record_emit(&key, t0());
        throttle.record_emit(&key, t0() + TimeDelta::hours(2));

        assert_eq!(throttle.len(), 1);
        assert_eq!(throttle.last_emit(&key), Some(t0() + TimeDelta::hours(2)));
        assert!(!throttle.should_emit(&key, t0() + TimeDelta::hours(2) + TimeDelta::minutes(59)));
    }

    #[test]
    fn test_unparseable_interval_fails_closed() {
        let key = SeriesKey::new("BTCUSDT", "soon");
        let mut throttle = AlertThrottle::new();
        throttle.record_emit(&key, t0());

        assert!(!throttle.should_emit(&key, t0() + TimeDelta::days(365)));
    }
}
