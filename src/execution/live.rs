use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::decision::{apply_exit, decide_exit};
use super::ledger::{EntrySnapshot, PositionLedger, TradeRecord};
use super::notifier::StatusNotifier;
use crate::api::CandleSource;
use crate::config::{BotConfig, TradingConfig};
use crate::error::Error;
use crate::models::{Candle, Signal};
use crate::risk::{ExitAction, RiskEngine};
use crate::strategy::{ScoreBreakdown, SignalAggregator, StrategySet};
use crate::Result;

/// Live loop settings (the `[live]` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Closed bars required before anything is evaluated
    pub min_bars: usize,
    /// Trailing closed bars handed to the strategies
    pub window: usize,
    /// Bars requested per poll, forming bar included
    pub fetch_limit: usize,
    pub cooldown_secs: i64,
    pub poll_interval_ms: u64,
    pub status_channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            min_bars: 100,
            window: 100,
            fetch_limit: 150,
            cooldown_secs: 60,
            poll_interval_ms: 1000,
            status_channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Flat,
    Open(Signal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NotReady { closed_bars: usize },
    CoolingDown { remaining_secs: i64 },
    Idle,
    Entered {
        direction: Signal,
        price: f64,
        amount: f64,
    },
    Holding,
    PartiallyClosed(TradeRecord),
    Closed(TradeRecord),
}

/// What one iteration saw and did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub score: Option<i32>,
    pub mark_price: Option<f64>,
}

impl TickReport {
    fn without_score(outcome: TickOutcome) -> Self {
        Self {
            outcome,
            score: None,
            mark_price: None,
        }
    }
}

/// Polls the candle source and trades one position on one market
pub struct LiveTrader<S> {
    source: S,
    trading: TradingConfig,
    settings: LiveConfig,
    aggregator: SignalAggregator,
    risk: RiskEngine,
    strategies: StrategySet,
    ledger: PositionLedger,
    last_exit: Option<DateTime<Utc>>,
    notifier: StatusNotifier,
}

impl<S: CandleSource> LiveTrader<S> {
    /// Trader running the bundled strategy set
    pub fn new(source: S, config: &BotConfig, notifier: StatusNotifier) -> Result<Self> {
        let strategies = StrategySet::standard(&config.scoring.tiers)?;
        Ok(Self::with_strategies(source, config, strategies, notifier))
    }

    pub fn with_strategies(
        source: S,
        config: &BotConfig,
        strategies: StrategySet,
        notifier: StatusNotifier,
    ) -> Self {
        let warm_up = strategies.min_candles_required();
        if config.live.window < warm_up {
            tracing::warn!(
                "Live window of {} bars is shorter than the {} bars the strategies need",
                config.live.window,
                warm_up
            );
        }

        let trading = config.trading.clone();
        let mut risk = RiskEngine::new(config.risk.clone(), config.fee_model());
        risk.update_parameters(&trading.interval, trading.leverage, &trading.symbol);

        Self {
            source,
            ledger: PositionLedger::new(trading.initial_balance, trading.leverage, config.fee_model()),
            trading,
            settings: config.live.clone(),
            aggregator: SignalAggregator::new(config.scoring.clone()),
            risk,
            strategies,
            last_exit: None,
            notifier,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn state(&self) -> LiveState {
        match self.ledger.direction() {
            Signal::Hold => LiveState::Flat,
            direction => LiveState::Open(direction),
        }
    }

    /// One iteration over freshly fetched candles; the last candle is still forming.
    pub fn evaluate(&mut self, candles: &[Candle], now: DateTime<Utc>) -> Result<TickReport> {
        let Some((forming, closed)) = candles.split_last() else {
            return Ok(TickReport::without_score(TickOutcome::NotReady { closed_bars: 0 }));
        };
        if closed.len() < self.settings.min_bars {
            return Ok(TickReport::without_score(TickOutcome::NotReady {
                closed_bars: closed.len(),
            }));
        }

        let window = &closed[closed.len().saturating_sub(self.settings.window)..];
        let mark_price = forming.close;

        if self.ledger.is_flat() {
            if let Some(remaining) = self.cooldown_remaining(now) {
                return Ok(TickReport::without_score(TickOutcome::CoolingDown {
                    remaining_secs: remaining,
                }));
            }
        }

        let breakdown = self.aggregator.score(window, &mut self.strategies);
        let score = Some(breakdown.total_score);
        let report = |outcome| TickReport {
            outcome,
            score,
            mark_price: Some(mark_price),
        };

        if self.ledger.is_flat() {
            let outcome = self.try_enter(&breakdown, mark_price, now)?;
            return Ok(report(outcome));
        }

        let leverage = self.trading.leverage;
        let position = self.ledger.position_mut().ok_or(Error::NoOpenPosition)?;
        let decision = decide_exit(
            &self.aggregator,
            &self.risk,
            &breakdown,
            window,
            position,
            mark_price,
            leverage,
        );

        let Some(record) = apply_exit(&mut self.ledger, &decision, mark_price, now)? else {
            return Ok(report(TickOutcome::Holding));
        };

        tracing::info!(
            "📉 {} {} @ {:.4}: PnL {:.2} ({:.2}%), balance {:.2}",
            record.exit_reason,
            self.trading.symbol,
            mark_price,
            record.realized_pnl,
            record.realized_roe,
            self.ledger.balance()
        );

        if decision.action == ExitAction::CloseAll {
            self.last_exit = Some(now);
            Ok(report(TickOutcome::Closed(record)))
        } else {
            Ok(report(TickOutcome::PartiallyClosed(record)))
        }
    }

    fn try_enter(
        &mut self,
        breakdown: &ScoreBreakdown,
        mark_price: f64,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome> {
        let direction = self.aggregator.entry_signal(breakdown);
        if direction == Signal::Hold {
            return Ok(TickOutcome::Idle);
        }

        let leverage = self.trading.leverage;
        let amount = self.ledger.balance() * leverage as f64 / mark_price;
        self.risk
            .update_parameters(&self.trading.interval, leverage, &self.trading.symbol);
        let trailing = self.risk.on_entry(mark_price);
        let snapshot = EntrySnapshot::capture(breakdown, &self.strategies);

        self.ledger
            .open(direction, mark_price, amount, now, trailing, snapshot)?;
        tracing::info!(
            "📈 Opened {} {} @ {:.4} amount {:.4} (score {})",
            direction.label(),
            self.trading.symbol,
            mark_price,
            amount,
            breakdown.total_score
        );

        Ok(TickOutcome::Entered {
            direction,
            price: mark_price,
            amount,
        })
    }

    fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let last_exit = self.last_exit?;
        let elapsed = now - last_exit;
        let cooldown = ChronoDuration::seconds(self.settings.cooldown_secs);
        (elapsed < cooldown).then(|| (cooldown - elapsed).num_seconds().max(0))
    }

    /// Fetch, evaluate and publish. Never fails; problems are logged and retried next tick.
    pub async fn tick(&mut self) {
        let fetched = self
            .source
            .fetch_latest(&self.trading.symbol, &self.trading.interval, self.settings.fetch_limit)
            .await;

        let candles = match fetched {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => {
                tracing::warn!("Empty candle response for {}", self.trading.symbol);
                self.notifier.log("No candle data, retrying");
                return;
            }
            Err(e) => {
                tracing::warn!("Candle fetch failed for {}: {}", self.trading.symbol, e);
                self.notifier.log(format!("Fetch failed: {}", e));
                return;
            }
        };

        let now = Utc::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.evaluate(&candles, now)));

        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::error!("Iteration failed: {}", e);
                self.notifier.log(format!("Iteration failed: {}", e));
                return;
            }
            Err(_) => {
                tracing::error!("Iteration panicked, continuing on next tick");
                self.notifier.log("Internal fault during evaluation");
                return;
            }
        };

        self.publish(&report);
    }

    /// At most one log and one status event per iteration
    fn publish(&self, report: &TickReport) {
        let message = match &report.outcome {
            TickOutcome::NotReady { closed_bars } => {
                tracing::debug!("Waiting for data: {} closed bars", closed_bars);
                None
            }
            TickOutcome::CoolingDown { remaining_secs } => {
                tracing::debug!("Cooldown: {}s remaining", remaining_secs);
                None
            }
            TickOutcome::Idle | TickOutcome::Holding => None,
            TickOutcome::Entered {
                direction,
                price,
                amount,
            } => Some(format!(
                "Opened {} @ {:.4} amount {:.4}",
                direction.label(),
                price,
                amount
            )),
            TickOutcome::PartiallyClosed(record) | TickOutcome::Closed(record) => Some(format!(
                "{} @ {:.4}: PnL {:.2} ({:+.2}%), balance {:.2}",
                record.exit_reason,
                record.exit_price,
                record.realized_pnl,
                record.realized_roe,
                self.ledger.balance()
            )),
        };

        if let Some(message) = message {
            self.notifier.log(message);
        }
        if let (Some(score), Some(mark_price)) = (report.score, report.mark_price) {
            self.notifier
                .status(score, mark_price, self.ledger.unrealized_pnl(mark_price));
        }
    }

    /// Poll until `stop` is set
    pub async fn run(&mut self, stop: Arc<AtomicBool>) {
        tracing::info!(
            "🚀 Live loop starting: {} {} x{}, {} strategies gated by {}",
            self.trading.symbol,
            self.trading.interval,
            self.trading.leverage,
            self.strategies.len(),
            self.strategies.filter().name()
        );

        let mut ticker = interval(Duration::from_millis(self.settings.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if stop.load(Ordering::Relaxed) {
                break;
            }
            self.tick().await;
        }

        tracing::info!(
            "👋 Live loop stopped, balance {:.2}, {} trades",
            self.ledger.balance(),
            self.ledger.history().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemorySource;
    use crate::execution::notifier::StatusEvent;
    use crate::strategy::{Analyzer, Evaluation, Tracked};
    use crate::testing::{base_time, candles_from_closes};

    struct Fixed(Signal);

    impl Analyzer for Fixed {
        fn evaluate(&self, _candles: &[Candle]) -> Option<Evaluation> {
            Some(Evaluation::new(self.0, Vec::new()))
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn fixed_set(weight: i32, vote: Signal, filter: Signal) -> StrategySet {
        StrategySet::builder()
            .strategy(Tracked::boxed("fixed", Fixed(vote)), weight)
            .regime_filter(Tracked::boxed("adx", Fixed(filter)))
            .build()
            .unwrap()
    }

    fn create_test_trader(set: StrategySet) -> LiveTrader<MemorySource> {
        let mut config = BotConfig::default();
        config.trading.symbol = "ETHUSDT".to_string();
        config.trading.interval = "30m".to_string();
        config.trading.leverage = 10;
        config.trading.initial_balance = 10_000.0;
        LiveTrader::with_strategies(MemorySource::default(), &config, set, StatusNotifier::disabled())
    }

    #[test]
    fn test_not_ready_below_min_bars() {
        let mut trader = create_test_trader(fixed_set(9, Signal::Buy, Signal::Buy));
        let candles = candles_from_closes(&[100.0; 100]);

        let report = trader.evaluate(&candles, base_time()).unwrap();
        assert_eq!(report.outcome, TickOutcome::NotReady { closed_bars: 99 });
        assert_eq!(trader.state(), LiveState::Flat);
    }

    #[test]
    fn test_enters_long_with_full_leverage_sizing() {
        let mut trader = create_test_trader(fixed_set(9, Signal::Buy, Signal::Buy));
        let candles = candles_from_closes(&[100.0; 101]);

        let report = trader.evaluate(&candles, base_time()).unwrap();

        assert_eq!(report.score, Some(9));
        match report.outcome {
            TickOutcome::Entered { direction, amount, .. } => {
                assert_eq!(direction, Signal::Buy);
                assert!((amount - 1000.0).abs() < 1e-9);
            }
            other => panic!("expected entry, got {:?}", other),
        }
        assert_eq!(trader.state(), LiveState::Open(Signal::Buy));
        assert_eq!(trader.ledger().position().unwrap().entry_snapshot.total_score, 9);
    }

    #[test]
    fn test_cooldown_blocks_reentry() {
        let mut trader = create_test_trader(fixed_set(9, Signal::Buy, Signal::Buy));
        let mut candles = candles_from_closes(&[100.0; 101]);
        trader.evaluate(&candles, base_time()).unwrap();

        // stop out on a 3% drop
        candles.last_mut().unwrap().close = 97.0;
        let report = trader.evaluate(&candles, base_time()).unwrap();
        assert!(matches!(report.outcome, TickOutcome::Closed(ref r) if r.exit_reason == "Stop Loss"));

        candles.last_mut().unwrap().close = 100.0;
        let report = trader
            .evaluate(&candles, base_time() + ChronoDuration::seconds(30))
            .unwrap();
        assert_eq!(report.outcome, TickOutcome::CoolingDown { remaining_secs: 30 });

        let report = trader
            .evaluate(&candles, base_time() + ChronoDuration::seconds(61))
            .unwrap();
        assert!(matches!(report.outcome, TickOutcome::Entered { .. }));
    }

    #[tokio::test]
    async fn test_tick_publishes_entry() {
        let (notifier, mut rx) = StatusNotifier::channel(8);
        let mut config = BotConfig::default();
        config.trading.initial_balance = 1_000.0;
        let source = MemorySource::new(candles_from_closes(&[50.0; 120]));
        let mut trader =
            LiveTrader::with_strategies(source, &config, fixed_set(9, Signal::Sell, Signal::Sell), notifier);

        trader.tick().await;

        assert!(matches!(rx.try_recv().unwrap(), StatusEvent::Log(m) if m.contains("SHORT")));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StatusEvent::Status { score: -9, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    struct FailingSource;

    impl CandleSource for FailingSource {
        async fn fetch_latest(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Candle>> {
            Err(Error::Exchange {
                status: 503,
                body: "service unavailable".to_string(),
            })
        }

        async fn fetch_range(
            &self,
            _symbol: &str,
            _interval: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    struct Exploding;

    impl Analyzer for Exploding {
        fn evaluate(&self, _candles: &[Candle]) -> Option<Evaluation> {
            panic!("indicator blew up");
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn assert_untouched<S: CandleSource>(trader: &LiveTrader<S>) {
        assert_eq!(trader.state(), LiveState::Flat);
        assert_eq!(trader.ledger().balance(), 10_000.0);
        assert!(trader.ledger().history().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_logged_and_retried() {
        let (notifier, mut rx) = StatusNotifier::channel(8);
        let mut trader = LiveTrader::with_strategies(
            FailingSource,
            &BotConfig::default(),
            fixed_set(9, Signal::Buy, Signal::Buy),
            notifier,
        );

        for _ in 0..2 {
            trader.tick().await;
            assert!(matches!(rx.try_recv().unwrap(), StatusEvent::Log(m) if m.starts_with("Fetch failed")));
            assert!(rx.try_recv().is_err());
            assert_untouched(&trader);
        }
    }

    #[tokio::test]
    async fn test_empty_fetch_is_logged_and_retried() {
        let (notifier, mut rx) = StatusNotifier::channel(8);
        let mut trader = LiveTrader::with_strategies(
            MemorySource::default(),
            &BotConfig::default(),
            fixed_set(9, Signal::Buy, Signal::Buy),
            notifier,
        );

        for _ in 0..2 {
            trader.tick().await;
            assert!(matches!(rx.try_recv().unwrap(), StatusEvent::Log(m) if m.contains("No candle data")));
            assert!(rx.try_recv().is_err());
            assert_untouched(&trader);
        }
    }

    #[tokio::test]
    async fn test_panicking_strategy_does_not_stop_the_loop() {
        let (notifier, mut rx) = StatusNotifier::channel(8);
        let set = StrategySet::builder()
            .strategy(Tracked::boxed("exploding", Exploding), 3)
            .regime_filter(Tracked::boxed("adx", Fixed(Signal::Buy)))
            .build()
            .unwrap();
        let source = MemorySource::new(candles_from_closes(&[100.0; 120]));
        let mut trader = LiveTrader::with_strategies(source, &BotConfig::default(), set, notifier);

        for _ in 0..2 {
            trader.tick().await;
            assert_eq!(
                rx.try_recv().unwrap(),
                StatusEvent::Log("Internal fault during evaluation".to_string())
            );
            assert!(rx.try_recv().is_err());
            assert_untouched(&trader);
        }
    }

    #[tokio::test]
    async fn test_run_on_its_own_task() {
        let mut config = BotConfig::default();
        config.live.poll_interval_ms = 5;
        let source = MemorySource::new(candles_from_closes(&[100.0; 120]));
        let mut trader = LiveTrader::with_strategies(
            source,
            &config,
            fixed_set(9, Signal::Buy, Signal::Buy),
            StatusNotifier::disabled(),
        );

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = tokio::spawn(async move {
            trader.run(stop_flag).await;
            trader
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.store(true, Ordering::Relaxed);
        let trader = handle.await.unwrap();

        assert_eq!(trader.state(), LiveState::Open(Signal::Buy));
    }

    #[tokio::test]
    async fn test_run_stops_on_flag() {
        let mut trader = create_test_trader(fixed_set(1, Signal::Hold, Signal::Hold));
        let stop = Arc::new(AtomicBool::new(true));

        trader.run(stop).await;
        assert!(trader.ledger().history().is_empty());
    }
}
