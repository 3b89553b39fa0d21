// Core modules
pub mod api;
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod strategy;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{BinanceFuturesClient, CandleSource, MemorySource};
pub use config::BotConfig;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
