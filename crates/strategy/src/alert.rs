use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use common::models::Alert;

use crate::signals::SignalEvent;

pub fn chart_url(symbol: &str) -> String {
    format!("https://www.binance.com/en/futures/{}", symbol)
}

/// Turns a fired signal into the Telegram payload.
pub fn compose_alert(event: SignalEvent, chat_id: i64, timezone: Tz, now: DateTime<Utc>) -> Alert {
    let SignalEvent {
        key,
        indicator,
        verdict,
        chart,
    } = event;

    let title = format!(
        "{} Signal - {} {} - {} {}",
        indicator,
        key.symbol,
        key.interval,
        verdict.direction.emoji(),
        verdict.direction
    );
    let local_time = now.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S");

    Alert::new(chat_id, title)
        .with_field("Close Price", verdict.close.to_string())
        .with_field(indicator, format!("{:.6}", verdict.indicator_value))
        .with_field("Distance", format!("{:.2}%", verdict.distance_ratio * 100.0))
        .with_field("Time", format!("{} {}", local_time, timezone.name()))
        .with_link("🔗 Open in Binance Chart", chart_url(&key.symbol))
        .with_chart(chart)
}

/// Startup notice listing the tracked universe.
pub fn compose_universe_notice(chat_id: i64, symbols: &[String], intervals: &[String]) -> Alert {
    Alert::new(chat_id, "Signal server started")
        .with_field("Symbols", symbols.join(", "))
        .with_field("Intervals", intervals.join(" "))
}
