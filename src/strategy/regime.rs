use super::{Analyzer, Evaluation};
use crate::indicators::calculate_adx;
use crate::models::{Candle, Signal};

/// ADX trend-strength gate.
///
/// Returns Hold in a weak or ranging market, otherwise the side of the
/// dominant directional indicator. Never used as an entry vote on its own.
#[derive(Debug, Clone)]
pub struct AdxFilter {
    pub period: usize,
    pub threshold: f64,
}

impl Default for AdxFilter {
    fn default() -> Self {
        Self {
            period: 14,
            threshold: 20.0,
        }
    }
}

impl Analyzer for AdxFilter {
    fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let (adx, plus_di, minus_di) = calculate_adx(candles, self.period)?;

        let signal = if adx < self.threshold {
            Signal::Hold
        } else if plus_di > minus_di {
            Signal::Buy
        } else if minus_di > plus_di {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Some(Evaluation::new(
            signal,
            vec![("adx", adx), ("plus_di", plus_di), ("minus_di", minus_di)],
        ))
    }

    fn min_candles_required(&self) -> usize {
        2 * self.period + 1
    }
}
