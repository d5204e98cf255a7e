pub mod alert;
pub mod candle;
pub mod market;
pub mod signal;

pub use alert::{Alert, AlertField, AlertLink};
pub use candle::{Candle, SeriesKey};
pub use market::{MarketInfo, Ticker};
pub use signal::{Direction, Verdict};
