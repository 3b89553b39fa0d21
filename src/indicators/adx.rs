/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX 20-25: Moderate trend
/// - ADX < 20: Weak trend / choppy / ranging market
///
/// Also returns +DI and -DI to determine trend direction:
/// - +DI > -DI: Uptrend
/// - -DI > +DI: Downtrend
use super::atr::true_ranges;
use crate::models::Candle;

/// Calculate ADX, +DI, and -DI for trend strength and direction
///
/// Needs `2 * period + 1` candles: `period` bars to seed the DI smoothing and
/// another `period` DX values to seed the ADX average.
///
/// Returns (adx, plus_di, minus_di) or None if insufficient data
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let ranges = true_ranges(candles);
    let (plus_dms, minus_dms): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let up_move = w[1].high - w[0].high;
            let down_move = w[0].low - w[1].low;
            let plus = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
            let minus = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
            (plus, minus)
        })
        .unzip();

    // Wilder running sums, seeded with the first `period` values
    let mut tr_sum: f64 = ranges[..period].iter().sum();
    let mut plus_sum: f64 = plus_dms[..period].iter().sum();
    let mut minus_sum: f64 = minus_dms[..period].iter().sum();

    let directional = |tr: f64, plus: f64, minus: f64| -> (f64, f64, f64) {
        if tr <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let plus_di = plus / tr * 100.0;
        let minus_di = minus / tr * 100.0;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        };
        (plus_di, minus_di, dx)
    };

    let (mut plus_di, mut minus_di, first_dx) = directional(tr_sum, plus_sum, minus_sum);
    let mut dxs = vec![first_dx];

    for i in period..ranges.len() {
        tr_sum = tr_sum - tr_sum / period as f64 + ranges[i];
        plus_sum = plus_sum - plus_sum / period as f64 + plus_dms[i];
        minus_sum = minus_sum - minus_sum / period as f64 + minus_dms[i];

        let (p, m, dx) = directional(tr_sum, plus_sum, minus_sum);
        plus_di = p;
        minus_di = m;
        dxs.push(dx);
    }

    if dxs.len() < period {
        return None;
    }

    let mut adx = dxs[..period].iter().sum::<f64>() / period as f64;
    for dx in &dxs[period..] {
        adx = (adx * (period as f64 - 1.0) + dx) / period as f64;
    }

    Some((adx, plus_di, minus_di))
}
