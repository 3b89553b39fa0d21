/// Typical bar range for an interval, in percent of price
///
/// Shorter intervals get tighter stops. Unknown intervals fall back to 2%.
pub fn interval_base_volatility(interval: &str) -> f64 {
    match interval {
        "1m" => 0.6,
        "3m" => 0.8,
        "5m" => 1.0,
        "15m" => 1.5,
        "30m" => 2.0,
        "1h" => 2.5,
        "2h" => 3.0,
        "4h" => 4.0,
        "6h" => 4.5,
        "8h" => 5.0,
        "12h" => 5.5,
        "1d" => 7.0,
        "3d" => 9.0,
        "1w" => 12.0,
        _ => 2.0,
    }
}

/// Relative volatility of a symbol versus ETH
pub fn symbol_multiplier(symbol: &str) -> f64 {
    match symbol.to_ascii_uppercase().as_str() {
        "BTCUSDT" => 0.8,
        "ETHUSDT" => 1.0,
        "BNBUSDT" => 1.1,
        "XRPUSDT" => 1.2,
        "SOLUSDT" | "ADAUSDT" => 1.3,
        "DOGEUSDT" => 1.4,
        _ => 1.5,
    }
}

/// Estimated stop distance in percent, before any leverage cap
pub fn estimated_stop_percent(interval: &str, symbol: &str) -> f64 {
    interval_base_volatility(interval) * symbol_multiplier(symbol)
}
