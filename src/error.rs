use crate::models::Signal;

/// Errors surfaced by the trading core and its adapters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("exchange returned {status}: {body}")]
    Exchange { status: u16, body: String },

    #[error("malformed candle row: {0}")]
    MalformedCandle(String),

    #[error("position already open ({0:?})")]
    PositionAlreadyOpen(Signal),

    #[error("no open position")]
    NoOpenPosition,

    #[error("invalid close ratio {0}, expected a value in (0, 1]")]
    InvalidCloseRatio(f64),

    #[error("invalid entry: price {price}, amount {amount}")]
    InvalidEntry { price: f64, amount: f64 },

    #[error("strategy set has no regime filter")]
    MissingRegimeFilter,

    #[error("duplicate strategy name: {0}")]
    DuplicateStrategy(String),

    #[error("invalid weight {weight} for {name}, expected 1..=3")]
    InvalidWeight { name: String, weight: i32 },
}
