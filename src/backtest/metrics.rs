use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::TradeRecord;

/// Balance and drawdown after one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub drawdown_percent: f64,
    pub max_drawdown_percent: f64,
}

/// Running peak balance and worst peak-to-trough decline
#[derive(Debug, Clone, Copy)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown_percent: f64,
}

impl DrawdownTracker {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            peak: initial_balance,
            max_drawdown_percent: 0.0,
        }
    }

    pub fn update(&mut self, timestamp: DateTime<Utc>, balance: f64) -> EquityPoint {
        self.peak = self.peak.max(balance);
        let drawdown_percent = if self.peak > 0.0 {
            (self.peak - balance) / self.peak * 100.0
        } else {
            0.0
        };
        self.max_drawdown_percent = self.max_drawdown_percent.max(drawdown_percent);

        EquityPoint {
            timestamp,
            balance,
            drawdown_percent,
            max_drawdown_percent: self.max_drawdown_percent,
        }
    }

    pub fn max_drawdown_percent(&self) -> f64 {
        self.max_drawdown_percent
    }
}

/// Outcome of one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub interval: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_pnl: f64,
    pub max_drawdown_percent: f64,
    pub win_count: usize,
    pub loss_count: usize,
    pub bankrupt: bool,
    /// Human-readable report, one line per entry
    pub log: Vec<String>,
    /// Chronological, partial closes included
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    pub fn total_trades(&self) -> usize {
        self.win_count + self.loss_count
    }

    pub fn win_rate(&self) -> f64 {
        match self.total_trades() {
            0 => 0.0,
            n => self.win_count as f64 / n as f64 * 100.0,
        }
    }

    pub fn return_percent(&self) -> f64 {
        if self.initial_balance > 0.0 {
            (self.final_balance - self.initial_balance) / self.initial_balance * 100.0
        } else {
            0.0
        }
    }

    /// Gross wins over gross losses
    pub fn profit_factor(&self) -> f64 {
        let wins: f64 = self.trades.iter().filter(|t| t.is_win()).map(|t| t.realized_pnl).sum();
        let losses: f64 = self
            .trades
            .iter()
            .filter(|t| !t.is_win())
            .map(|t| t.realized_pnl.abs())
            .sum();

        if losses > 0.0 {
            wins / losses
        } else if wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 {} {}", self.symbol, self.interval);
        println!("  Initial Balance:       ${:.2}", self.initial_balance);
        println!("  Final Balance:         ${:.2}", self.final_balance);
        println!(
            "  Net P&L:               ${:.2} ({:+.2}%)",
            self.total_pnl,
            self.return_percent()
        );

        println!("\n📈 TRADE STATISTICS");
        println!("  Closed Trades:         {}", self.total_trades());
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.win_count,
            self.win_rate()
        );
        println!("  Losing Trades:         {}", self.loss_count);
        if self.total_trades() > 0 {
            println!("  Profit Factor:         {:.2}", self.profit_factor());
        }

        println!("\n⚠️  RISK METRICS");
        println!("  Max Drawdown:          {:.2}%", self.max_drawdown_percent);
        if self.bankrupt {
            println!("  💀 Account went bankrupt");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::base_time;

    #[test]
    fn test_drawdown_tracker() {
        let mut tracker = DrawdownTracker::new(1000.0);

        let p = tracker.update(base_time(), 900.0);
        assert!((p.drawdown_percent - 10.0).abs() < 1e-9);

        let p = tracker.update(base_time(), 1200.0);
        assert_eq!(p.drawdown_percent, 0.0);
        assert!((p.max_drawdown_percent - 10.0).abs() < 1e-9);

        let p = tracker.update(base_time(), 600.0);
        assert!((p.drawdown_percent - 50.0).abs() < 1e-9);
        assert!((tracker.max_drawdown_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_of_wiped_account() {
        let mut tracker = DrawdownTracker::new(1000.0);
        let p = tracker.update(base_time(), -200.0);
        assert!((p.drawdown_percent - 120.0).abs() < 1e-9);
    }
}
