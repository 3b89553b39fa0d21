//! PnL and fee accounting shared by the live loop and the backtest.

use serde::{Deserialize, Serialize};

use crate::models::Signal;

/// Taker fee per side (0.05%)
pub const DEFAULT_FEE_RATE: f64 = 0.0005;

/// Price move in the position's favor; zero when flat
pub fn directional_delta(entry_price: f64, exit_price: f64, direction: Signal) -> f64 {
    match direction {
        Signal::Buy => exit_price - entry_price,
        Signal::Sell => entry_price - exit_price,
        Signal::Hold => 0.0,
    }
}

/// Return on equity in percent: raw price return times leverage.
///
/// Zero entry price or zero leverage yield 0 instead of dividing by zero.
pub fn roe_percent(entry_price: f64, mark_price: f64, leverage: f64, direction: Signal) -> f64 {
    if entry_price <= 0.0 || leverage <= 0.0 {
        return 0.0;
    }
    directional_delta(entry_price, mark_price, direction) / entry_price * leverage * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    pub fee_rate: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

impl FeeModel {
    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }

    /// Realized PnL after paying the fee on both entry and exit notional
    pub fn realized_pnl(&self, entry_price: f64, exit_price: f64, amount: f64, direction: Signal) -> f64 {
        let gross = directional_delta(entry_price, exit_price, direction) * amount;
        gross - self.round_trip_fee(entry_price, exit_price, amount)
    }

    /// Round-trip fee cost of opening and closing `amount` at these prices
    pub fn round_trip_fee(&self, entry_price: f64, exit_price: f64, amount: f64) -> f64 {
        (entry_price + exit_price) * amount * self.fee_rate
    }

    /// ROE in percent with round-trip fees already subtracted
    pub fn net_roe_percent(&self, entry_price: f64, exit_price: f64, leverage: f64, direction: Signal) -> f64 {
        if entry_price <= 0.0 || leverage <= 0.0 {
            return 0.0;
        }
        self.realized_pnl(entry_price, exit_price, 1.0, direction) / entry_price * leverage * 100.0
    }
}
