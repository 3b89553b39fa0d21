use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar plus the number of trades printed during the bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

impl Candle {
    /// Bullish bodies close above the open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Directional vote, also used as the direction of a position (Hold = flat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn opposite(self) -> Self {
        match self {
            Signal::Buy => Signal::Sell,
            Signal::Sell => Signal::Buy,
            Signal::Hold => Signal::Hold,
        }
    }

    /// +1 for Buy, -1 for Sell, 0 for Hold
    pub fn sign(self) -> i32 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Signal::Buy => "LONG",
            Signal::Sell => "SHORT",
            Signal::Hold => "FLAT",
        }
    }
}

/// Sort candles by timestamp and drop duplicate timestamps.
///
/// When two bars share a timestamp the one seen last wins, which matches how
/// paginated fetches overlap at page boundaries.
pub fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    // stable sort keeps fetch order among equal timestamps
    candles.sort_by_key(|c| c.timestamp);

    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}
