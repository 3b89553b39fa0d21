//! Bounded oscillators: stochastic, Williams %R, CCI and Bollinger bands.

use super::moving_average::calculate_sma;
use crate::models::Candle;

fn high_low(candles: &[Candle]) -> (f64, f64) {
    candles.iter().fold((f64::MIN, f64::MAX), |(hi, lo), c| {
        (hi.max(c.high), lo.min(c.low))
    })
}

/// Stochastic %K at the latest bar and %D (SMA of %K over `d_period`)
pub fn calculate_stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Option<(f64, f64)> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period - 1 {
        return None;
    }

    let ks: Vec<f64> = candles
        .windows(k_period)
        .map(|w| {
            let (hi, lo) = high_low(w);
            let close = w[w.len() - 1].close;
            if hi > lo {
                (close - lo) / (hi - lo) * 100.0
            } else {
                50.0
            }
        })
        .collect();

    let k = *ks.last()?;
    let d = calculate_sma(&ks, d_period)?;
    Some((k, d))
}

/// Williams %R in [-100, 0]
pub fn calculate_williams_r(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let window = &candles[candles.len() - period..];
    let (hi, lo) = high_low(window);
    let close = window[period - 1].close;

    if hi > lo {
        Some((hi - close) / (hi - lo) * -100.0)
    } else {
        Some(-50.0)
    }
}

/// Commodity Channel Index on typical price
pub fn calculate_cci(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let typical: Vec<f64> = candles[candles.len() - period..]
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();

    let mean = typical.iter().sum::<f64>() / period as f64;
    let mean_dev = typical.iter().map(|t| (t - mean).abs()).sum::<f64>() / period as f64;
    if mean_dev == 0.0 {
        return Some(0.0);
    }

    Some((typical[period - 1] - mean) / (0.015 * mean_dev))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Bollinger bands at `k` population standard deviations
pub fn calculate_bollinger(prices: &[f64], period: usize, k: f64) -> Option<Bollinger> {
    let middle = calculate_sma(prices, period)?;
    let window = &prices[prices.len() - period..];
    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let band = variance.sqrt() * k;

    Some(Bollinger {
        middle,
        upper: middle + band,
        lower: middle - band,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candles_from_closes, candles_from_ohlc};

    #[test]
    fn test_stochastic_at_top_of_range() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let (k, d) = calculate_stochastic(&candles, 14, 3).unwrap();

        assert!(k > 90.0, "k = {}", k);
        assert!(d > 80.0);
    }

    #[test]
    fn test_stochastic_flat_range_is_neutral() {
        let candles = candles_from_ohlc(&[(100.0, 100.0, 100.0, 100.0); 20]);
        assert_eq!(calculate_stochastic(&candles, 14, 3), Some((50.0, 50.0)));
    }

    #[test]
    fn test_williams_r_bounds() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let candles = candles_from_closes(&closes);
        let wr = calculate_williams_r(&candles, 14).unwrap();

        assert!((-100.0..=0.0).contains(&wr));
        assert!(wr < -80.0, "falling market should read oversold, got {}", wr);
    }

    #[test]
    fn test_cci_flat_is_zero() {
        let candles = candles_from_ohlc(&[(100.0, 101.0, 99.0, 100.0); 25]);
        assert_eq!(calculate_cci(&candles, 20), Some(0.0));
    }

    #[test]
    fn test_cci_spike_is_high() {
        let mut bars = vec![(100.0, 101.0, 99.0, 100.0); 24];
        bars.push((100.0, 112.0, 100.0, 111.0));
        let candles = candles_from_ohlc(&bars);
        assert!(calculate_cci(&candles, 20).unwrap() > 100.0);
    }

    #[test]
    fn test_bollinger_contains_mean() {
        let prices = vec![99.0, 101.0, 99.0, 101.0, 99.0, 101.0];
        let bands = calculate_bollinger(&prices, 6, 2.0).unwrap();

        assert_eq!(bands.middle, 100.0);
        assert!((bands.upper - 102.0).abs() < 1e-9);
        assert!((bands.lower - 98.0).abs() < 1e-9);
    }
}
