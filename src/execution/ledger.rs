use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pnl::FeeModel;
use crate::error::Error;
use crate::models::Signal;
use crate::risk::TrailingState;
use crate::strategy::{ScoreBreakdown, StrategySet};
use crate::Result;

/// What the consensus looked like when a position was opened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub total_score: i32,
    pub signals: BTreeMap<String, Signal>,
    pub diagnostics: BTreeMap<String, String>,
}

impl EntrySnapshot {
    pub fn capture(breakdown: &ScoreBreakdown, set: &StrategySet) -> Self {
        Self {
            total_score: breakdown.total_score,
            signals: breakdown.signals.clone(),
            diagnostics: set.diagnostics(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Signal,
    pub entry_price: f64,
    pub amount: f64,
    pub entry_time: DateTime<Utc>,
    pub trailing: TrailingState,
    pub entry_snapshot: EntrySnapshot,
}

/// Closed (or partially closed) trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub direction: Signal,
    pub entry_price: f64,
    pub exit_price: f64,
    pub amount: f64,
    pub realized_pnl: f64,
    /// Net of fees, in percent
    pub realized_roe: f64,
    pub leverage: u32,
    pub exit_reason: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub partial: bool,
    pub total_score_at_entry: i32,
    pub signals_at_entry: BTreeMap<String, Signal>,
    pub diagnostics_at_entry: BTreeMap<String, String>,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }
}

/// Balance, the single open position and the trade history
#[derive(Debug, Clone)]
pub struct PositionLedger {
    balance: f64,
    leverage: u32,
    fees: FeeModel,
    position: Option<Position>,
    history: Vec<TradeRecord>,
}

impl PositionLedger {
    pub fn new(balance: f64, leverage: u32, fees: FeeModel) -> Self {
        Self {
            balance,
            leverage,
            fees,
            position: None,
            history: Vec::new(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn leverage(&self) -> u32 {
        self.leverage
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    /// Direction of the open position, Hold when flat
    pub fn direction(&self) -> Signal {
        self.position.as_ref().map_or(Signal::Hold, |p| p.direction)
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Chronological trade history
    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn history_recent_first(&self) -> impl Iterator<Item = &TradeRecord> {
        self.history.iter().rev()
    }

    pub fn into_history(self) -> Vec<TradeRecord> {
        self.history
    }

    /// Fee-inclusive PnL if the whole position were closed at `mark_price`
    pub fn unrealized_pnl(&self, mark_price: f64) -> f64 {
        self.position.as_ref().map_or(0.0, |p| {
            self.fees
                .realized_pnl(p.entry_price, mark_price, p.amount, p.direction)
        })
    }

    pub fn open(
        &mut self,
        direction: Signal,
        entry_price: f64,
        amount: f64,
        entry_time: DateTime<Utc>,
        trailing: TrailingState,
        entry_snapshot: EntrySnapshot,
    ) -> Result<()> {
        if let Some(open) = &self.position {
            return Err(Error::PositionAlreadyOpen(open.direction));
        }
        if direction == Signal::Hold || entry_price <= 0.0 || amount <= 0.0 || !amount.is_finite() {
            return Err(Error::InvalidEntry {
                price: entry_price,
                amount,
            });
        }

        self.position = Some(Position {
            direction,
            entry_price,
            amount,
            entry_time,
            trailing,
            entry_snapshot,
        });
        Ok(())
    }

    /// Close `ratio` of the open amount. A ratio of 1.0 closes everything.
    pub fn close_partial(
        &mut self,
        ratio: f64,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: &str,
    ) -> Result<TradeRecord> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::InvalidCloseRatio(ratio));
        }
        if ratio >= 1.0 {
            return self.close_all(exit_price, exit_time, reason);
        }

        let position = self.position.as_mut().ok_or(Error::NoOpenPosition)?;
        let closed_amount = position.amount * ratio;
        position.amount -= closed_amount;
        let position = position.clone();

        Ok(self.realize(&position, closed_amount, exit_price, exit_time, reason, true))
    }

    pub fn close_all(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: &str,
    ) -> Result<TradeRecord> {
        let position = self.position.take().ok_or(Error::NoOpenPosition)?;
        let amount = position.amount;

        Ok(self.realize(&position, amount, exit_price, exit_time, reason, false))
    }

    fn realize(
        &mut self,
        position: &Position,
        amount: f64,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: &str,
        partial: bool,
    ) -> TradeRecord {
        let realized_pnl =
            self.fees
                .realized_pnl(position.entry_price, exit_price, amount, position.direction);
        self.balance += realized_pnl;

        let record = TradeRecord {
            id: Uuid::new_v4(),
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            amount,
            realized_pnl,
            realized_roe: self.fees.net_roe_percent(
                position.entry_price,
                exit_price,
                self.leverage as f64,
                position.direction,
            ),
            leverage: self.leverage,
            exit_reason: reason.to_string(),
            entry_time: position.entry_time,
            exit_time,
            partial,
            total_score_at_entry: position.entry_snapshot.total_score,
            signals_at_entry: position.entry_snapshot.signals.clone(),
            diagnostics_at_entry: position.entry_snapshot.diagnostics.clone(),
        };

        self.history.push(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::base_time;
    use chrono::Duration;

    fn create_test_ledger() -> PositionLedger {
        PositionLedger::new(10_000.0, 10, FeeModel::default())
    }

    fn open_long(ledger: &mut PositionLedger, price: f64, amount: f64) {
        ledger
            .open(
                Signal::Buy,
                price,
                amount,
                base_time(),
                TrailingState::default(),
                EntrySnapshot::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_single_open_position() {
        let mut ledger = create_test_ledger();
        open_long(&mut ledger, 100.0, 10.0);

        let second = ledger.open(
            Signal::Sell,
            100.0,
            10.0,
            base_time(),
            TrailingState::default(),
            EntrySnapshot::default(),
        );

        assert!(matches!(second, Err(Error::PositionAlreadyOpen(Signal::Buy))));
        assert_eq!(ledger.direction(), Signal::Buy);
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let mut ledger = create_test_ledger();
        let result = ledger.open(
            Signal::Buy,
            100.0,
            0.0,
            base_time(),
            TrailingState::default(),
            EntrySnapshot::default(),
        );

        assert!(matches!(result, Err(Error::InvalidEntry { .. })));
        assert!(ledger.is_flat());
    }

    #[test]
    fn test_close_all_realizes_pnl() {
        let mut ledger = create_test_ledger();
        open_long(&mut ledger, 100.0, 10.0);

        let record = ledger
            .close_all(110.0, base_time() + Duration::minutes(5), "Take Profit")
            .unwrap();

        // 100 gross - (1000 + 1100) * 0.0005 fees
        assert!((record.realized_pnl - 98.95).abs() < 1e-9);
        assert!((ledger.balance() - 10_098.95).abs() < 1e-9);
        assert!(ledger.is_flat());
        assert_eq!(ledger.direction(), Signal::Hold);
        assert!(!record.partial);
        assert!(record.is_win());
    }

    #[test]
    fn test_partial_close_reduces_amount() {
        let mut ledger = create_test_ledger();
        open_long(&mut ledger, 100.0, 10.0);

        let record = ledger
            .close_partial(0.5, 105.0, base_time(), "Trailing Partial")
            .unwrap();

        assert!(record.partial);
        assert!((record.amount - 5.0).abs() < 1e-12);
        assert!((ledger.position().unwrap().amount - 5.0).abs() < 1e-12);
        assert_eq!(ledger.history().len(), 1);
    }

    #[test]
    fn test_close_ratio_validation() {
        let mut ledger = create_test_ledger();
        open_long(&mut ledger, 100.0, 10.0);

        assert!(matches!(
            ledger.close_partial(0.0, 100.0, base_time(), "x"),
            Err(Error::InvalidCloseRatio(_))
        ));
        assert!(matches!(
            ledger.close_partial(1.5, 100.0, base_time(), "x"),
            Err(Error::InvalidCloseRatio(_))
        ));

        ledger.close_partial(1.0, 100.0, base_time(), "x").unwrap();
        assert!(ledger.is_flat());
    }

    #[test]
    fn test_close_when_flat() {
        let mut ledger = create_test_ledger();
        assert!(matches!(
            ledger.close_all(100.0, base_time(), "x"),
            Err(Error::NoOpenPosition)
        ));
    }

    #[test]
    fn test_history_order() {
        let mut ledger = create_test_ledger();
        for (i, exit) in [101.0, 99.0, 102.0].into_iter().enumerate() {
            open_long(&mut ledger, 100.0, 1.0);
            ledger
                .close_all(exit, base_time() + Duration::minutes(i as i64), "x")
                .unwrap();
        }

        let recent: Vec<f64> = ledger.history_recent_first().map(|t| t.exit_price).collect();
        assert_eq!(recent, vec![102.0, 99.0, 101.0]);
        assert_eq!(ledger.history()[0].exit_price, 101.0);
    }
}
