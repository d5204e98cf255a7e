pub mod candle_store;
pub mod symbol_manager;

pub use candle_store::{CandleSeries, CandleStore, PreloadError, PreloadReport, UpsertOutcome, Window};
pub use symbol_manager::SymbolTable;
