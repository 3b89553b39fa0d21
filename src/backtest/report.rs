//! Human-readable run log and the JSON trade log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::execution::TradeRecord;
use crate::Result;

pub const BANKRUPT_MARKER: &str = "!!! BANKRUPT";
pub const NOT_ENOUGH_DATA: &str = "Not enough data";

/// Line-oriented report embedded in [`super::BacktestResult::log`]
#[derive(Debug, Default)]
pub struct ReportLog {
    lines: Vec<String>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(
        &mut self,
        symbol: &str,
        interval: &str,
        leverage: u32,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        bars: usize,
    ) {
        let range = match range {
            Some((start, end)) => format!(
                "{} -> {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            ),
            None => "no data".to_string(),
        };
        self.lines.push(format!(
            "=== Backtest {} {} x{} | {} | {} bars ===",
            symbol, interval, leverage, range, bars
        ));
    }

    pub fn trade(&mut self, record: &TradeRecord, balance: f64) {
        self.lines.push(format!(
            "{} {} {}{} {} PnL {:+.2} ({:+.2}%) Balance {:.2}",
            record.exit_time.format("%Y-%m-%d %H:%M"),
            record.direction.label(),
            record.exit_reason,
            if record.partial { " (partial)" } else { "" },
            if record.is_win() { "WIN" } else { "LOSS" },
            record.realized_pnl,
            record.realized_roe,
            balance
        ));
    }

    pub fn bankrupt(&mut self, at: DateTime<Utc>, balance: f64) {
        self.lines.push(format!(
            "{} at {}: balance {:.2}",
            BANKRUPT_MARKER,
            at.format("%Y-%m-%d %H:%M"),
            balance
        ));
    }

    pub fn not_enough_data(&mut self, have: usize, need: usize) {
        self.lines
            .push(format!("{}: {} bars, need at least {}", NOT_ENOUGH_DATA, have, need));
    }

    pub fn summary(&mut self, initial: f64, final_balance: f64, wins: usize, losses: usize, max_dd: f64) {
        self.lines.push(format!(
            "Final balance {:.2} (PnL {:+.2}) | {} wins / {} losses | max drawdown {:.2}%",
            final_balance,
            final_balance - initial,
            wins,
            losses,
            max_dd
        ));
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// `<dir>/backtest_<symbol>_<interval>_<YYYYMMDD_HHMMSS>.json`
pub fn trade_log_path(dir: &Path, symbol: &str, interval: &str, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "backtest_{}_{}_{}.json",
        symbol,
        interval,
        at.format("%Y%m%d_%H%M%S")
    ))
}

/// Write the chronological trade list as pretty JSON
pub fn write_trade_log(
    dir: &Path,
    symbol: &str,
    interval: &str,
    at: DateTime<Utc>,
    trades: &[TradeRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = trade_log_path(dir, symbol, interval, at);
    let json = serde_json::to_string_pretty(trades)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
