// Market data adapters
pub mod binance;
pub mod source;

pub use binance::{BinanceFuturesClient, SourceConfig};
pub use source::{CandleSource, MemorySource};
