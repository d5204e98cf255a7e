pub mod remote;
pub mod services;
pub mod traits;
pub mod universe;

pub use traits::{CandleFeed, ExchangeError, FeedBatch, HistorySource, MarketCatalog, Subscription};
