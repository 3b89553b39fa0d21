use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{BacktestResult, DrawdownTracker};
use super::report::{write_trade_log, ReportLog};
use crate::api::CandleSource;
use crate::config::{BotConfig, TradingConfig};
use crate::execution::{apply_exit, decide_exit, EntrySnapshot, FeeModel, PositionLedger};
use crate::models::{normalize_candles, Candle, Signal};
use crate::risk::{estimated_stop_percent, ExitAction, RiskEngine};
use crate::strategy::{ScoreBreakdown, SignalAggregator, StrategySet};
use crate::Result;

/// Simulator settings (the `[backtest]` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Trailing closed bars scored per step
    pub window: usize,
    /// Bars to wait after a full exit before re-entering
    pub cooldown_bars: usize,
    /// Fraction of balance put at risk per trade
    pub risk_fraction: f64,
    pub min_notional: f64,
    pub trade_log_dir: PathBuf,
    pub write_trade_log: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            window: 100,
            cooldown_bars: 12,
            risk_fraction: 0.02,
            min_notional: 50.0,
            trade_log_dir: PathBuf::from("backtest_logs"),
            write_trade_log: true,
        }
    }
}

/// Replays candles through the same scoring and exit logic as the live loop
pub struct BacktestSimulator {
    trading: TradingConfig,
    settings: BacktestConfig,
    fees: FeeModel,
    aggregator: SignalAggregator,
    risk: RiskEngine,
    strategies: StrategySet,
}

impl BacktestSimulator {
    /// Simulator running the bundled strategy set
    pub fn new(config: &BotConfig) -> Result<Self> {
        let strategies = StrategySet::standard(&config.scoring.tiers)?;
        Ok(Self::with_strategies(config, strategies))
    }

    pub fn with_strategies(config: &BotConfig, strategies: StrategySet) -> Self {
        let warm_up = strategies.min_candles_required();
        if config.backtest.window < warm_up {
            tracing::warn!(
                "Backtest window of {} bars is shorter than the {} bars the strategies need",
                config.backtest.window,
                warm_up
            );
        }

        Self {
            trading: config.trading.clone(),
            settings: config.backtest.clone(),
            fees: config.fee_model(),
            aggregator: SignalAggregator::new(config.scoring.clone()),
            risk: RiskEngine::new(config.risk.clone(), config.fee_model()),
            strategies,
        }
    }

    /// Fetch `[start, end]` from `source`, then replay it
    pub async fn run_range<S: CandleSource>(
        &mut self,
        source: &S,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BacktestResult> {
        let candles = source
            .fetch_range(&self.trading.symbol, &self.trading.interval, start, end)
            .await?;
        tracing::info!(
            "Fetched {} {} {} candles for backtest",
            candles.len(),
            self.trading.symbol,
            self.trading.interval
        );
        Ok(self.run(&candles))
    }

    /// Notional for a new position: risk budget over the estimated stop,
    /// capped at full leverage and floored at the minimum notional
    fn position_notional(&self, balance: f64) -> f64 {
        let stop_fraction =
            estimated_stop_percent(&self.trading.interval, &self.trading.symbol) / 100.0;
        let risk_sized = balance * self.settings.risk_fraction / stop_fraction;
        let cap = balance * self.trading.leverage as f64;

        risk_sized.min(cap).max(self.settings.min_notional)
    }

    /// Entry direction for this bar, Hold while cooling down
    fn entry_direction(&self, breakdown: &ScoreBreakdown, cooled_down: bool) -> Signal {
        if cooled_down {
            self.aggregator.entry_signal(breakdown)
        } else {
            Signal::Hold
        }
    }

    pub fn run(&mut self, candles: &[Candle]) -> BacktestResult {
        let candles = normalize_candles(candles.to_vec());
        let symbol = self.trading.symbol.clone();
        let interval = self.trading.interval.clone();
        let leverage = self.trading.leverage;
        let initial_balance = self.trading.initial_balance;
        let window = self.settings.window.max(1);

        let mut log = ReportLog::new();
        log.header(
            &symbol,
            &interval,
            leverage,
            candles
                .first()
                .zip(candles.last())
                .map(|(a, b)| (a.timestamp, b.timestamp)),
            candles.len(),
        );

        let mut ledger = PositionLedger::new(initial_balance, leverage, self.fees);
        let mut drawdown = DrawdownTracker::new(initial_balance);
        let mut equity_curve = Vec::with_capacity(candles.len().saturating_sub(window));
        let mut last_exit_bar: Option<usize> = None;
        let mut bankrupt = false;

        if candles.len() < window + 1 {
            tracing::warn!("{} {}: not enough data for a backtest", symbol, interval);
            log.not_enough_data(candles.len(), window + 1);
            return self.finish(log, ledger, equity_curve, drawdown, false);
        }

        self.risk.update_parameters(&interval, leverage, &symbol);
        tracing::info!(
            "Starting backtest: {} {} x{}, {} candles",
            symbol,
            interval,
            leverage,
            candles.len()
        );

        for i in window..candles.len() {
            let closed = &candles[i - window..i];
            let bar = &candles[i];

            let breakdown = self.aggregator.score(closed, &mut self.strategies);
            let cooled_down = last_exit_bar.map_or(true, |exit| i - exit >= self.settings.cooldown_bars);
            let entry = if ledger.is_flat() {
                self.entry_direction(&breakdown, cooled_down)
            } else {
                Signal::Hold
            };

            let short_path = ledger.direction() == Signal::Sell || entry == Signal::Sell;
            let path = if short_path {
                [bar.open, bar.high, bar.low, bar.close]
            } else {
                [bar.open, bar.low, bar.high, bar.close]
            };

            for price in path {
                if ledger.is_flat() {
                    if entry == Signal::Hold {
                        continue;
                    }

                    let amount = self.position_notional(ledger.balance()) / price;
                    let trailing = self.risk.on_entry(price);
                    let snapshot = EntrySnapshot::capture(&breakdown, &self.strategies);
                    if let Err(e) = ledger.open(entry, price, amount, bar.timestamp, trailing, snapshot) {
                        tracing::warn!("Backtest entry rejected at {}: {}", bar.timestamp, e);
                    } else {
                        tracing::debug!(
                            "{} {} @ {:.4} amount {:.4} (score {})",
                            bar.timestamp,
                            entry.label(),
                            price,
                            amount,
                            breakdown.total_score
                        );
                    }
                    continue;
                }

                let Some(position) = ledger.position_mut() else {
                    continue;
                };

                let decision = decide_exit(
                    &self.aggregator,
                    &self.risk,
                    &breakdown,
                    closed,
                    position,
                    price,
                    leverage,
                );

                match apply_exit(&mut ledger, &decision, price, bar.timestamp) {
                    Ok(Some(record)) => {
                        log.trade(&record, ledger.balance());
                        if decision.action == ExitAction::CloseAll {
                            last_exit_bar = Some(i);
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Backtest exit failed at {}: {}", bar.timestamp, e),
                }

                if ledger.balance() <= 0.0 {
                    break;
                }
            }

            equity_curve.push(drawdown.update(bar.timestamp, ledger.balance()));

            if ledger.balance() <= 0.0 {
                bankrupt = true;
                log.bankrupt(bar.timestamp, ledger.balance());
                tracing::warn!("{} {}: bankrupt at {}", symbol, interval, bar.timestamp);
                break;
            }
        }

        if !bankrupt {
            if let Some(last) = candles.last() {
                if !ledger.is_flat() {
                    match ledger.close_all(last.close, last.timestamp, "End of Backtest") {
                        Ok(record) => {
                            log.trade(&record, ledger.balance());
                            equity_curve.push(drawdown.update(last.timestamp, ledger.balance()));
                        }
                        Err(e) => tracing::warn!("Failed to close final position: {}", e),
                    }
                }
            }
        }

        self.finish(log, ledger, equity_curve, drawdown, bankrupt)
    }

    fn finish(
        &self,
        mut log: ReportLog,
        ledger: PositionLedger,
        equity_curve: Vec<super::EquityPoint>,
        drawdown: DrawdownTracker,
        bankrupt: bool,
    ) -> BacktestResult {
        let initial_balance = self.trading.initial_balance;
        let final_balance = ledger.balance();
        let trades = ledger.into_history();
        let win_count = trades.iter().filter(|t| !t.partial && t.is_win()).count();
        let loss_count = trades.iter().filter(|t| !t.partial && !t.is_win()).count();

        log.summary(
            initial_balance,
            final_balance,
            win_count,
            loss_count,
            drawdown.max_drawdown_percent(),
        );

        if self.settings.write_trade_log {
            match write_trade_log(
                &self.settings.trade_log_dir,
                &self.trading.symbol,
                &self.trading.interval,
                Utc::now(),
                &trades,
            ) {
                Ok(path) => tracing::info!("Trade log written to {}", path.display()),
                Err(e) => tracing::warn!("Failed to write trade log: {}", e),
            }
        }

        BacktestResult {
            symbol: self.trading.symbol.clone(),
            interval: self.trading.interval.clone(),
            initial_balance,
            final_balance,
            total_pnl: final_balance - initial_balance,
            max_drawdown_percent: drawdown.max_drawdown_percent(),
            win_count,
            loss_count,
            bankrupt,
            log: log.into_lines(),
            trades,
            equity_curve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::report::{BANKRUPT_MARKER, NOT_ENOUGH_DATA};
    use crate::strategy::{Analyzer, Evaluation, Tracked};
    use crate::testing::{candles_from_closes, candles_from_ohlc};

    struct Fixed(Signal);

    impl Analyzer for Fixed {
        fn evaluate(&self, _candles: &[Candle]) -> Option<Evaluation> {
            Some(Evaluation::new(self.0, Vec::new()))
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn create_test_simulator(vote: Signal) -> BacktestSimulator {
        let mut config = BotConfig::default();
        config.trading.symbol = "TESTUSDT".to_string();
        config.trading.interval = "1m".to_string();
        config.backtest.write_trade_log = false;

        let set = StrategySet::builder()
            .strategy(Tracked::boxed("fixed", Fixed(vote)), 9)
            .regime_filter(Tracked::boxed("adx", Fixed(vote)))
            .build()
            .unwrap();
        BacktestSimulator::with_strategies(&config, set)
    }

    /// Votes with the body of the latest closed bar
    struct LastBody;

    impl Analyzer for LastBody {
        fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
            let last = candles.last()?;
            let signal = if last.is_bullish() {
                Signal::Buy
            } else if last.is_bearish() {
                Signal::Sell
            } else {
                Signal::Hold
            };
            Some(Evaluation::new(signal, vec![("body", last.close - last.open)]))
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    /// Weight 14 under a holding filter scores exactly +-7
    fn create_body_simulator() -> BacktestSimulator {
        let mut config = BotConfig::default();
        config.trading.symbol = "TESTUSDT".to_string();
        config.trading.interval = "1m".to_string();
        config.backtest.write_trade_log = false;

        let set = StrategySet::builder()
            .strategy(Tracked::boxed("body", LastBody), 14)
            .regime_filter(Tracked::boxed("adx", Fixed(Signal::Hold)))
            .build()
            .unwrap();
        BacktestSimulator::with_strategies(&config, set)
    }

    /// 99 dojis, one bullish bar, so a long opens at the open of bar 100
    fn long_setup() -> Vec<(f64, f64, f64, f64)> {
        let mut bars = vec![(100.0, 100.1, 99.9, 100.0); 99];
        bars.push((99.9, 100.1, 99.8, 100.0));
        bars
    }

    #[test]
    fn test_not_enough_data() {
        let mut sim = create_test_simulator(Signal::Buy);
        let result = sim.run(&candles_from_closes(&[100.0; 100]));

        assert!(result.log.iter().any(|l| l.contains(NOT_ENOUGH_DATA)));
        assert_eq!(result.final_balance, result.initial_balance);
        assert!(result.trades.is_empty());
    }

    #[test]
    fn test_position_sizing() {
        let mut sim = create_test_simulator(Signal::Buy);

        // 1m base 0.6% x unknown symbol 1.5 = 0.9% stop; 200 / 0.009
        assert!((sim.position_notional(10_000.0) - 22_222.222_222).abs() < 1e-3);
        // floored at the minimum notional
        assert_eq!(sim.position_notional(1.0), 50.0);

        sim.settings.risk_fraction = 0.5;
        // capped at balance x leverage
        assert!((sim.position_notional(10_000.0) - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_market_closes_at_end() {
        let mut sim = create_test_simulator(Signal::Buy);
        let result = sim.run(&candles_from_closes(&[100.0; 150]));

        let last = result.trades.last().unwrap();
        assert_eq!(last.exit_reason, "End of Backtest");
        assert_eq!(result.trades.len(), 1);
        assert!(result.final_balance < result.initial_balance);
    }

    #[test]
    fn test_short_path_hits_high_first() {
        let mut sim = create_test_simulator(Signal::Sell);
        let mut bars = vec![(100.0, 100.1, 99.9, 100.0); 101];
        // short opened at 100 on bar 100; next bar spikes to 103 before dumping to 90
        bars.push((100.0, 103.0, 90.0, 95.0));
        let result = sim.run(&candles_from_ohlc(&bars));

        assert_eq!(result.trades[0].exit_reason, "Stop Loss");
        assert_eq!(result.trades[0].exit_price, 103.0);
    }

    #[test]
    fn test_bankruptcy_halts_run() {
        let mut sim = create_test_simulator(Signal::Buy);
        let mut bars = vec![(100.0, 100.1, 99.9, 100.0); 100];
        bars.push((100.0, 100.0, 40.0, 45.0));
        bars.extend(vec![(45.0, 46.0, 44.0, 45.0); 30]);
        let result = sim.run(&candles_from_ohlc(&bars));

        assert!(result.bankrupt);
        assert!(result.final_balance <= 0.0);
        assert!(result.log.iter().any(|l| l.starts_with(BANKRUPT_MARKER)));
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.equity_curve.len(), 1);
    }

    #[test]
    fn test_reversal_closes_before_risk_checks() {
        let mut sim = create_body_simulator();
        let mut bars = long_setup();
        bars.push((100.0, 100.1, 99.9, 99.95));
        // the bearish bar 100 flips the score to -7 while the long sits near entry
        bars.extend(vec![(99.95, 100.0, 99.9, 99.95); 5]);
        let result = sim.run(&candles_from_ohlc(&bars));

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.direction, Signal::Buy);
        assert_eq!(trade.total_score_at_entry, 7);
        assert_eq!(trade.exit_reason, "Signal Reversal");
        assert_eq!(trade.exit_price, 99.95);
        assert_eq!(trade.exit_time, trade.entry_time + chrono::Duration::minutes(1));
    }

    #[test]
    fn test_long_path_hits_low_first() {
        let mut sim = create_body_simulator();
        let mut bars = long_setup();
        bars.push((100.0, 100.1, 99.9, 100.0));
        // both the stop (99.1) and the target (101.8) are inside this bar
        bars.push((100.0, 110.0, 95.0, 100.0));
        let result = sim.run(&candles_from_ohlc(&bars));

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, "Stop Loss");
        assert_eq!(result.trades[0].exit_price, 95.0);
    }

    #[test]
    fn test_trailing_partial_keeps_position_open() {
        let mut sim = create_body_simulator();
        let mut bars = long_setup();
        bars.push((100.0, 100.1, 99.9, 100.0));
        // peak +15% ROE at 101.5, then 6% given back at the close
        bars.push((100.0, 101.5, 100.0, 100.9));
        bars.extend(vec![(100.9, 100.95, 100.85, 100.9); 5]);
        let result = sim.run(&candles_from_ohlc(&bars));

        assert_eq!(result.trades.len(), 2);
        let partial = &result.trades[0];
        let rest = &result.trades[1];

        assert!(partial.partial);
        assert_eq!(partial.exit_reason, "Trailing Partial");
        assert_eq!(partial.exit_price, 100.9);

        assert!(!rest.partial);
        assert_eq!(rest.exit_reason, "End of Backtest");
        assert_eq!(rest.entry_time, partial.entry_time);
        assert!((rest.amount - partial.amount).abs() < 1e-9);

        // both halves were sized from the original notional
        let full_amount = sim.position_notional(10_000.0) / 100.0;
        assert!((partial.amount + rest.amount - full_amount).abs() < 1e-9);
        assert_eq!(result.win_count, 1);
    }
}
