//! Mean-reversion and momentum oscillators.

use super::{Analyzer, Evaluation};
use crate::indicators::{
    calculate_bollinger, calculate_cci, calculate_rsi, calculate_stochastic, calculate_williams_r,
};
use crate::models::{Candle, Signal};

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Classify `value` against a lower (buy) and upper (sell) band
fn fade(value: f64, lower: f64, upper: f64) -> Signal {
    if value < lower {
        Signal::Buy
    } else if value > upper {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

#[derive(Debug, Clone)]
pub struct RsiReversion {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Analyzer for RsiReversion {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let rsi = calculate_rsi(&closes(candles), self.period)?;
        Some(Evaluation::new(
            fade(rsi, self.oversold, self.overbought),
            vec![("rsi", rsi)],
        ))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}

/// %K crossing %D inside the extreme zones
#[derive(Debug, Clone)]
pub struct StochasticCross {
    pub k_period: usize,
    pub d_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Analyzer for StochasticCross {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let (k, d) = calculate_stochastic(candles, self.k_period, self.d_period)?;

        let signal = if k < self.oversold && k > d {
            Signal::Buy
        } else if k > self.overbought && k < d {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("k", k), ("d", d)]))
    }

    fn min_candles_required(&self) -> usize {
        self.k_period + self.d_period - 1
    }
}

#[derive(Debug, Clone)]
pub struct WilliamsR {
    pub period: usize,
}

impl Analyzer for WilliamsR {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let wr = calculate_williams_r(candles, self.period)?;
        Some(Evaluation::new(fade(wr, -80.0, -20.0), vec![("williams_r", wr)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period
    }
}

#[derive(Debug, Clone)]
pub struct CciReversion {
    pub period: usize,
    pub band: f64,
}

impl Analyzer for CciReversion {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let cci = calculate_cci(candles, self.period)?;
        Some(Evaluation::new(fade(cci, -self.band, self.band), vec![("cci", cci)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period
    }
}

#[derive(Debug, Clone)]
pub struct BollingerReversion {
    pub period: usize,
    pub k: f64,
}

impl Analyzer for BollingerReversion {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let prices = closes(candles);
        let bands = calculate_bollinger(&prices, self.period, self.k)?;
        let close = *prices.last()?;

        Some(Evaluation::new(
            fade(close, bands.lower, bands.upper),
            vec![("lower", bands.lower), ("middle", bands.middle), ("upper", bands.upper)],
        ))
    }

    fn min_candles_required(&self) -> usize {
        self.period
    }
}

/// Momentum: percent change over `period` bars beyond a threshold
#[derive(Debug, Clone)]
pub struct RateOfChange {
    pub period: usize,
    pub threshold_pct: f64,
}

impl Analyzer for RateOfChange {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let last = candles.last()?.close;
        let base = candles.get(candles.len().checked_sub(self.period + 1)?)?.close;
        if base == 0.0 {
            return None;
        }

        let roc = (last - base) / base * 100.0;
        let signal = if roc > self.threshold_pct {
            Signal::Buy
        } else if roc < -self.threshold_pct {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("roc_pct", roc)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}
