//! Trend-following analyzers.

use super::{Analyzer, Evaluation};
use crate::indicators::{calculate_ema, calculate_macd, calculate_sma};
use crate::models::{Candle, Signal};

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Fast/slow EMA alignment confirmed by price on the fast side
#[derive(Debug, Clone)]
pub struct EmaCross {
    pub fast: usize,
    pub slow: usize,
}

impl Analyzer for EmaCross {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let prices = closes(candles);
        let fast = calculate_ema(&prices, self.fast)?;
        let slow = calculate_ema(&prices, self.slow)?;
        let close = *prices.last()?;

        let signal = if fast > slow && close > fast {
            Signal::Buy
        } else if fast < slow && close < fast {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("ema_fast", fast), ("ema_slow", slow)]))
    }

    fn min_candles_required(&self) -> usize {
        self.slow + 1
    }
}

/// MACD histogram sign with a widening histogram
#[derive(Debug, Clone)]
pub struct MacdMomentum {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdMomentum {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl Analyzer for MacdMomentum {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let macd = calculate_macd(&closes(candles), self.fast, self.slow, self.signal)?;

        let signal = if macd.histogram > 0.0 && macd.histogram >= macd.prev_histogram {
            Signal::Buy
        } else if macd.histogram < 0.0 && macd.histogram <= macd.prev_histogram {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(
            signal,
            vec![("macd", macd.macd), ("signal", macd.signal), ("hist", macd.histogram)],
        ))
    }

    fn min_candles_required(&self) -> usize {
        self.slow + self.signal
    }
}

/// Close beyond the prior `period`-bar channel
#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    pub period: usize,
}

impl Analyzer for DonchianBreakout {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let (last, prior) = candles.split_last()?;
        let channel = prior.get(prior.len().checked_sub(self.period)?..)?;

        let upper = channel.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lower = channel.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let signal = if last.close > upper {
            Signal::Buy
        } else if last.close < lower {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("upper", upper), ("lower", lower)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}

/// Run of same-colored Heikin-Ashi candles
#[derive(Debug, Clone)]
pub struct HeikinAshiTrend {
    pub streak: usize,
}

impl Analyzer for HeikinAshiTrend {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let first = candles.first()?;
        let mut ha_open = (first.open + first.close) / 2.0;
        let mut ha_close = (first.open + first.high + first.low + first.close) / 4.0;

        // +1 bullish, -1 bearish, 0 doji
        let mut colors = Vec::with_capacity(candles.len());
        for c in &candles[1..] {
            ha_open = (ha_open + ha_close) / 2.0;
            ha_close = (c.open + c.high + c.low + c.close) / 4.0;
            colors.push(if ha_close > ha_open {
                1
            } else if ha_close < ha_open {
                -1
            } else {
                0
            });
        }

        let recent = colors.get(colors.len().checked_sub(self.streak)?..)?;
        let signal = if recent.iter().all(|&c| c == 1) {
            Signal::Buy
        } else if recent.iter().all(|&c| c == -1) {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("ha_open", ha_open), ("ha_close", ha_close)]))
    }

    fn min_candles_required(&self) -> usize {
        self.streak + 2
    }
}

/// Percent change of an SMA over `lookback` bars
#[derive(Debug, Clone)]
pub struct SmaSlope {
    pub period: usize,
    pub lookback: usize,
    pub min_slope_pct: f64,
}

impl Analyzer for SmaSlope {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let prices = closes(candles);
        let now = calculate_sma(&prices, self.period)?;
        let then = calculate_sma(&prices[..prices.len().checked_sub(self.lookback)?], self.period)?;
        if then == 0.0 {
            return None;
        }

        let slope_pct = (now - then) / then * 100.0;
        let signal = if slope_pct > self.min_slope_pct {
            Signal::Buy
        } else if slope_pct < -self.min_slope_pct {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("sma", now), ("slope_pct", slope_pct)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + self.lookback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candles_from_closes, candles_from_ohlc};

    fn rising(n: usize) -> Vec<Candle> {
        candles_from_closes(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    fn falling(n: usize) -> Vec<Candle> {
        candles_from_closes(&(0..n).map(|i| 300.0 - i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn test_ema_cross_follows_trend() {
        let strategy = EmaCross { fast: 9, slow: 21 };
        assert_eq!(strategy.evaluate(&rising(60)).unwrap().signal, Signal::Buy);
        assert_eq!(strategy.evaluate(&falling(60)).unwrap().signal, Signal::Sell);
    }

    #[test]
    fn test_ema_cross_flat_holds() {
        let strategy = EmaCross { fast: 9, slow: 21 };
        let candles = candles_from_closes(&[100.0; 60]);
        assert_eq!(strategy.evaluate(&candles).unwrap().signal, Signal::Hold);
    }

    #[test]
    fn test_macd_accelerating_uptrend_buys() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let candles = candles_from_closes(&closes);
        assert_eq!(MacdMomentum::default().evaluate(&candles).unwrap().signal, Signal::Buy);
    }

    #[test]
    fn test_donchian_breakout() {
        let mut bars = vec![(100.0, 101.0, 99.0, 100.0); 25];
        bars.push((100.0, 104.0, 100.0, 103.0));
        let candles = candles_from_ohlc(&bars);
        let strategy = DonchianBreakout { period: 20 };

        let eval = strategy.evaluate(&candles).unwrap();
        assert_eq!(eval.signal, Signal::Buy);
        assert_eq!(eval.readings[0], ("upper", 101.0));
    }

    #[test]
    fn test_donchian_breakdown() {
        let mut bars = vec![(100.0, 101.0, 99.0, 100.0); 25];
        bars.push((99.0, 99.0, 96.0, 97.0));
        let candles = candles_from_ohlc(&bars);
        let strategy = DonchianBreakout { period: 20 };
        assert_eq!(strategy.evaluate(&candles).unwrap().signal, Signal::Sell);
    }

    #[test]
    fn test_heikin_ashi_streak() {
        let strategy = HeikinAshiTrend { streak: 3 };
        assert_eq!(strategy.evaluate(&rising(20)).unwrap().signal, Signal::Buy);
        assert_eq!(strategy.evaluate(&falling(20)).unwrap().signal, Signal::Sell);
    }

    #[test]
    fn test_sma_slope() {
        let strategy = SmaSlope {
            period: 20,
            lookback: 5,
            min_slope_pct: 0.5,
        };
        assert_eq!(strategy.evaluate(&rising(40)).unwrap().signal, Signal::Buy);
        assert_eq!(strategy.evaluate(&falling(40)).unwrap().signal, Signal::Sell);

        let flat = candles_from_closes(&[100.0; 40]);
        assert_eq!(strategy.evaluate(&flat).unwrap().signal, Signal::Hold);
    }
}
