//! Exit handling shared by the live loop and the backtest simulator.

use chrono::{DateTime, Utc};

use super::ledger::{Position, PositionLedger, TradeRecord};
use crate::models::Candle;
use crate::risk::{ExitAction, ExitDecision, RiskEngine};
use crate::strategy::{ScoreBreakdown, SignalAggregator};
use crate::Result;

pub const SIGNAL_REVERSAL: &str = "Signal Reversal";

/// Decide the exit for the open position.
///
/// A hard score reversal always wins, even when the risk engine would also
/// have fired on the same evaluation.
pub fn decide_exit(
    aggregator: &SignalAggregator,
    risk: &RiskEngine,
    breakdown: &ScoreBreakdown,
    closed: &[Candle],
    position: &mut Position,
    mark_price: f64,
    leverage: u32,
) -> ExitDecision {
    if aggregator.is_reversal(breakdown, position.direction) {
        return ExitDecision::close_all(SIGNAL_REVERSAL);
    }

    risk.evaluate_exit(
        closed,
        &mut position.trailing,
        position.direction,
        position.entry_price,
        mark_price,
        leverage,
    )
}

/// Apply a decision to the ledger, returning the trade it produced
pub fn apply_exit(
    ledger: &mut PositionLedger,
    decision: &ExitDecision,
    price: f64,
    time: DateTime<Utc>,
) -> Result<Option<TradeRecord>> {
    let record = match decision.action {
        ExitAction::NoAction => return Ok(None),
        ExitAction::ClosePartial => {
            ledger.close_partial(decision.amount_ratio, price, time, &decision.reason)?
        }
        ExitAction::CloseAll => ledger.close_all(price, time, &decision.reason)?,
    };
    Ok(Some(record))
}
