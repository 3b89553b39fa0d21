//! Participation-based analyzers: volume, trade count, OBV and VWAP.

use super::{Analyzer, Evaluation};
use crate::indicators::{calculate_obv_series, calculate_vwap};
use crate::models::{Candle, Signal};

/// Direction of the latest candle body when `metric` spikes above its average
fn surge_signal(
    candles: &[Candle],
    period: usize,
    multiplier: f64,
    metric: impl Fn(&Candle) -> f64,
) -> Option<(Signal, f64)> {
    let (last, prior) = candles.split_last()?;
    let window = prior.get(prior.len().checked_sub(period)?..)?;
    let average = window.iter().map(&metric).sum::<f64>() / period as f64;
    if average <= 0.0 {
        return None;
    }

    let ratio = metric(last) / average;
    let signal = if ratio <= multiplier {
        Signal::Hold
    } else if last.is_bullish() {
        Signal::Buy
    } else if last.is_bearish() {
        Signal::Sell
    } else {
        Signal::Hold
    };

    Some((signal, ratio))
}

#[derive(Debug, Clone)]
pub struct VolumeSurge {
    pub period: usize,
    pub multiplier: f64,
}

impl Analyzer for VolumeSurge {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let (signal, ratio) = surge_signal(candles, self.period, self.multiplier, |c| c.volume)?;
        Some(Evaluation::new(signal, vec![("volume_ratio", ratio)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}

/// Same as [`VolumeSurge`] but on the exchange trade count
#[derive(Debug, Clone)]
pub struct TradeIntensity {
    pub period: usize,
    pub multiplier: f64,
}

impl Analyzer for TradeIntensity {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let (signal, ratio) =
            surge_signal(candles, self.period, self.multiplier, |c| c.trade_count as f64)?;
        Some(Evaluation::new(signal, vec![("trade_ratio", ratio)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}

/// OBV and price moving the same way over `period` bars
#[derive(Debug, Clone)]
pub struct ObvTrend {
    pub period: usize,
}

impl Analyzer for ObvTrend {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let obv = calculate_obv_series(candles);
        let n = obv.len();
        let start = n.checked_sub(self.period + 1)?;

        let obv_delta = obv[n - 1] - obv[start];
        let price_delta = candles[n - 1].close - candles[start].close;

        let signal = if obv_delta > 0.0 && price_delta > 0.0 {
            Signal::Buy
        } else if obv_delta < 0.0 && price_delta < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("obv_delta", obv_delta)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }
}

/// Close holding outside a band around the rolling VWAP
#[derive(Debug, Clone)]
pub struct VwapTrend {
    pub period: usize,
    pub band_pct: f64,
}

impl Analyzer for VwapTrend {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let vwap = calculate_vwap(candles, self.period)?;
        let close = candles.last()?.close;
        let band = vwap * self.band_pct / 100.0;

        let signal = if close > vwap + band {
            Signal::Buy
        } else if close < vwap - band {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(signal, vec![("vwap", vwap)]))
    }

    fn min_candles_required(&self) -> usize {
        self.period
    }
}
