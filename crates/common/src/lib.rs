pub mod clock;
pub mod config;
pub mod interval;
pub mod logger;
pub mod models;
