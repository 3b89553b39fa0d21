//! Candle builders shared by unit tests.

use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};

pub fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(19_000)
}

/// One candle per minute from `(open, high, low, close)` tuples
pub fn candles_from_ohlc(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    bars.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            timestamp: base_time() + Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
            trade_count: 100,
        })
        .collect()
}

/// Flat-bodied candles with a small range around each close
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let mut prev = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Candle {
                timestamp: base_time() + Duration::minutes(i as i64),
                open,
                high: open.max(close) * 1.001,
                low: open.min(close) * 0.999,
                close,
                volume: 1000.0,
                trade_count: 100,
            }
        })
        .collect()
}
