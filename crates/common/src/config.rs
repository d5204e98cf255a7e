use std::env;
use std::fmt;

use chrono_tz::Tz;
use thiserror::Error;

use crate::interval;

const DEFAULT_TLD: &str = "com";
const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
const DEFAULT_TOP_SYMBOLS: usize = 5;
const DEFAULT_INTERVALS: &str = "15m 1h 4h";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{key}={value} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Default)]
pub struct ExchangeSettings {
    pub api_key: String,
    pub api_secret: String,
    pub tld: String,
    pub proxy_url: Option<String>,
}

impl fmt::Debug for ExchangeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeSettings")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("tld", &self.tld)
            .field("proxy_url", &self.proxy_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: i64,
    /// Chat receiving lifecycle notices; `None` disables them.
    pub log_peer_id: Option<i64>,
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .field("log_peer_id", &self.log_peer_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeSettings,
    pub telegram: TelegramSettings,
    pub timezone: Tz,
    pub top_symbols: usize,
    pub intervals: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let exchange = ExchangeSettings {
            api_key: get("BINANCE_API_KEY").unwrap_or_default(),
            api_secret: get("BINANCE_API_SECRET").unwrap_or_default(),
            tld: get("BINANCE_TLD").unwrap_or_else(|| DEFAULT_TLD.to_string()),
            proxy_url: get("BINANCE_PROXY_URL"),
        };

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let chat_id = get("TELEGRAM_CHAT_ID")
            .ok_or(ConfigError::Missing("TELEGRAM_CHAT_ID"))
            .and_then(|v| parse_number("TELEGRAM_CHAT_ID", v))?;
        let log_peer_id = get("TELEGRAM_LOG_PEER_ID")
            .map(|v| parse_number::<i64>("TELEGRAM_LOG_PEER_ID", v))
            .transpose()?
            .filter(|id| *id != -1);

        let timezone_name = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                key: "TIMEZONE",
                value: timezone_name.clone(),
                reason: e.to_string(),
            })?;

        let top_symbols = match get("TOP_SYMBOLS") {
            Some(v) => parse_number::<usize>("TOP_SYMBOLS", v)?,
            None => DEFAULT_TOP_SYMBOLS,
        };
        if top_symbols == 0 {
            return Err(ConfigError::Invalid {
                key: "TOP_SYMBOLS",
                value: "0".to_string(),
                reason: "must track at least one symbol".to_string(),
            });
        }

        let raw_intervals = get("INTERVALS").unwrap_or_else(|| DEFAULT_INTERVALS.to_string());
        let intervals = parse_intervals(&raw_intervals)?;

        Ok(Self {
            exchange,
            telegram: TelegramSettings {
                bot_token,
                chat_id,
                log_peer_id,
            },
            timezone,
            top_symbols,
            intervals,
        })
    }
}

fn parse_number<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_intervals(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut intervals: Vec<String> = Vec::new();
    for token in raw.split_whitespace() {
        interval::to_seconds(token).map_err(|e| ConfigError::Invalid {
            key: "INTERVALS",
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !intervals.iter().any(|i| i == token) {
            intervals.push(token.to_string());
        }
    }

    if intervals.is_empty() {
        return Err(ConfigError::Invalid {
            key: "INTERVALS",
            value: raw.to_string(),
            reason: "no interval given".to_string(),
        });
    }
    Ok(intervals)
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "...." }
}
