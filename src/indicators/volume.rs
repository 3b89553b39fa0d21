//! Volume studies: on-balance volume and rolling VWAP.

use crate::models::Candle;

/// Cumulative on-balance volume, one value per candle
pub fn calculate_obv_series(candles: &[Candle]) -> Vec<f64> {
    let mut obv = 0.0;
    let mut series = Vec::with_capacity(candles.len());
    series.push(obv);

    for w in candles.windows(2) {
        if w[1].close > w[0].close {
            obv += w[1].volume;
        } else if w[1].close < w[0].close {
            obv -= w[1].volume;
        }
        series.push(obv);
    }

    if candles.is_empty() {
        series.clear();
    }
    series
}

/// Volume-weighted average typical price over the last `period` candles
pub fn calculate_vwap(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let (pv, vol) = candles[candles.len() - period..]
        .iter()
        .fold((0.0, 0.0), |(pv, vol), c| {
            let typical = (c.high + c.low + c.close) / 3.0;
            (pv + typical * c.volume, vol + c.volume)
        });

    if vol > 0.0 {
        Some(pv / vol)
    } else {
        None
    }
}
