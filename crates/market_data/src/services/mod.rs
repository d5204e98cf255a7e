pub mod kline_feed;

pub use kline_feed::KlineFeed;
