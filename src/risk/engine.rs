use serde::{Deserialize, Serialize};

use super::volatility::estimated_stop_percent;
use crate::execution::pnl::{roe_percent, FeeModel};
use crate::indicators::calculate_atr;
use crate::models::{Candle, Signal};

/// Tolerance for ROE threshold comparisons (an exact -20% must hit a 20% stop)
const ROE_EPSILON: f64 = 1e-9;

/// Tunable exit policy (the `[risk]` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Multiplier on the volatility-table stop distance
    pub stop_scale: f64,
    /// Take-profit distance as a multiple of the stop distance
    pub reward_ratio: f64,
    /// Largest stop expressed as ROE percent; the price stop is capped at this / leverage
    pub max_stop_roe: f64,
    /// Trailing arms once peak ROE reaches this fraction of the take-profit ROE
    pub trailing_activation: f64,
    /// Minimum ROE giveback from the peak before trailing fires
    pub trailing_giveback_roe: f64,
    pub atr_period: usize,
    /// ATR% x leverage x this widens the giveback in volatile markets
    pub atr_giveback_multiple: f64,
    /// Fraction closed on the first trailing trigger
    pub partial_ratio: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            stop_scale: 1.0,
            reward_ratio: 2.0,
            max_stop_roe: 50.0,
            trailing_activation: 0.5,
            trailing_giveback_roe: 5.0,
            atr_period: 14,
            atr_giveback_multiple: 1.0,
            partial_ratio: 0.5,
        }
    }
}

/// Stop and target distances in percent of price (not ROE)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
}

/// Trailing-stop memory for one open position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    /// Highest ROE seen since entry (or since the last partial)
    pub peak_roe: f64,
    pub partial_taken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    NoAction,
    ClosePartial,
    CloseAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub action: ExitAction,
    pub reason: String,
    /// Fraction of the open amount to close; 1.0 for CloseAll
    pub amount_ratio: f64,
}

impl ExitDecision {
    pub fn none() -> Self {
        Self {
            action: ExitAction::NoAction,
            reason: String::new(),
            amount_ratio: 0.0,
        }
    }

    pub fn close_all(reason: impl Into<String>) -> Self {
        Self {
            action: ExitAction::CloseAll,
            reason: reason.into(),
            amount_ratio: 1.0,
        }
    }

    /// Partial close; the ratio is kept strictly inside (0, 1)
    pub fn close_partial(ratio: f64, reason: impl Into<String>) -> Self {
        Self {
            action: ExitAction::ClosePartial,
            reason: reason.into(),
            amount_ratio: ratio.clamp(0.01, 0.99),
        }
    }

    pub fn is_none(&self) -> bool {
        self.action == ExitAction::NoAction
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ParameterKey {
    interval: String,
    leverage: u32,
    symbol: String,
}

/// Owns stop/target parameters and decides exits for the open position
#[derive(Debug, Clone)]
pub struct RiskEngine {
    policy: RiskPolicy,
    fees: FeeModel,
    key: Option<ParameterKey>,
    params: RiskParameters,
}

impl RiskEngine {
    pub fn new(policy: RiskPolicy, fees: FeeModel) -> Self {
        Self {
            policy,
            fees,
            key: None,
            params: RiskParameters {
                stop_loss_percent: 0.0,
                take_profit_percent: 0.0,
            },
        }
    }

    pub fn parameters(&self) -> RiskParameters {
        self.params
    }

    /// Pure derivation of stop/target for a market
    pub fn derive_parameters(&self, interval: &str, leverage: u32, symbol: &str) -> RiskParameters {
        let mut stop = estimated_stop_percent(interval, symbol) * self.policy.stop_scale;
        if leverage > 0 {
            stop = stop.min(self.policy.max_stop_roe / leverage as f64);
        }

        RiskParameters {
            stop_loss_percent: stop,
            take_profit_percent: stop * self.policy.reward_ratio,
        }
    }

    /// Recompute parameters if any input changed. Returns true on change.
    pub fn update_parameters(&mut self, interval: &str, leverage: u32, symbol: &str) -> bool {
        let key = ParameterKey {
            interval: interval.to_string(),
            leverage,
            symbol: symbol.to_string(),
        };
        if self.key.as_ref() == Some(&key) {
            return false;
        }

        self.params = self.derive_parameters(interval, leverage, symbol);
        tracing::debug!(
            "Risk parameters for {} {} x{}: SL {:.2}% TP {:.2}%",
            symbol,
            interval,
            leverage,
            self.params.stop_loss_percent,
            self.params.take_profit_percent
        );
        self.key = Some(key);
        true
    }

    /// Fresh trailing state for a new position
    pub fn on_entry(&mut self, entry_price: f64) -> TrailingState {
        if let Some(key) = self.key.clone() {
            self.params = self.derive_parameters(&key.interval, key.leverage, &key.symbol);
        }
        tracing::debug!("Trailing state reset at entry {:.4}", entry_price);
        TrailingState::default()
    }

    /// Decide what to do with the open position at `mark_price`.
    ///
    /// Precedence: stop loss, take profit, break even, trailing giveback.
    /// At most one decision is returned.
    pub fn evaluate_exit(
        &self,
        closed: &[Candle],
        trailing: &mut TrailingState,
        direction: Signal,
        entry_price: f64,
        mark_price: f64,
        leverage: u32,
    ) -> ExitDecision {
        if direction == Signal::Hold || entry_price <= 0.0 || leverage == 0 {
            return ExitDecision::none();
        }

        let lev = leverage as f64;
        let roe = roe_percent(entry_price, mark_price, lev, direction);
        let stop_roe = self.params.stop_loss_percent * lev;
        let target_roe = self.params.take_profit_percent * lev;

        if roe <= -stop_roe + ROE_EPSILON {
            return ExitDecision::close_all("Stop Loss");
        }
        if roe >= target_roe - ROE_EPSILON {
            return ExitDecision::close_all("Take Profit");
        }
        if trailing.partial_taken && roe <= 0.0 {
            return ExitDecision::close_all("Break Even");
        }

        trailing.peak_roe = trailing.peak_roe.max(roe);
        if trailing.peak_roe < self.policy.trailing_activation * target_roe {
            return ExitDecision::none();
        }

        let giveback = trailing.peak_roe - roe;
        if giveback <= self.giveback_threshold(closed, lev) {
            return ExitDecision::none();
        }

        if trailing.partial_taken {
            ExitDecision::close_all("Trailing Stop")
        } else {
            trailing.partial_taken = true;
            trailing.peak_roe = roe;
            ExitDecision::close_partial(self.policy.partial_ratio, "Trailing Partial")
        }
    }

    /// ROE giveback tolerated from the peak, widened by recent ATR
    fn giveback_threshold(&self, closed: &[Candle], leverage: f64) -> f64 {
        let atr_pct = match (calculate_atr(closed, self.policy.atr_period), closed.last()) {
            (Some(atr), Some(last)) if last.close > 0.0 => atr / last.close * 100.0,
            _ => 0.0,
        };
        self.policy
            .trailing_giveback_roe
            .max(atr_pct * leverage * self.policy.atr_giveback_multiple)
    }

    /// ROE after round-trip fees, for display
    pub fn calculate_net_roe(&self, entry_price: f64, mark_price: f64, leverage: u32, direction: Signal) -> f64 {
        self.fees
            .net_roe_percent(entry_price, mark_price, leverage as f64, direction)
    }
}
