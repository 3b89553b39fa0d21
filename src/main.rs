use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use futurebot::api::{BinanceFuturesClient, CandleSource};
use futurebot::backtest::{BacktestResult, BacktestSimulator};
use futurebot::config::BotConfig;
use futurebot::execution::{LiveTrader, StatusEvent, StatusNotifier};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "futurebot", about = "Leveraged futures signal bot", version)]
struct Cli {
    /// TOML config file (defaults to ./futurebot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Paper-trade one market against live candles
    Live {
        #[arg(short, long)]
        symbol: Option<String>,
        #[arg(short, long)]
        interval: Option<String>,
        #[arg(short, long)]
        leverage: Option<u32>,
    },
    /// Replay historical candles for one or more symbols
    Backtest {
        /// Symbols to test, e.g. BTCUSDT ETHUSDT
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(short, long)]
        interval: Option<String>,
        #[arg(short, long)]
        leverage: Option<u32>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD), defaults to now
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Days of history when no start date is given
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut config = BotConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Live {
            symbol,
            interval,
            leverage,
        } => {
            apply_overrides(&mut config, symbol, interval, leverage);
            run_live(config).await
        }
        Command::Backtest {
            symbols,
            interval,
            leverage,
            start,
            end,
            days,
        } => {
            apply_overrides(&mut config, None, interval, leverage);
            let (start, end) = resolve_range(start, end, days)?;
            run_backtests(config, symbols, start, end).await
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("futurebot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_overrides(
    config: &mut BotConfig,
    symbol: Option<String>,
    interval: Option<String>,
    leverage: Option<u32>,
) {
    if let Some(symbol) = symbol {
        config.trading.symbol = symbol.to_uppercase();
    }
    if let Some(interval) = interval {
        config.trading.interval = interval;
    }
    if let Some(leverage) = leverage {
        config.trading.leverage = leverage;
    }
}

fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end = match end {
        Some(date) => date
            .and_hms_opt(23, 59, 59)
            .context("invalid end date")?
            .and_utc(),
        None => Utc::now(),
    };
    let start = match start {
        Some(date) => date
            .and_hms_opt(0, 0, 0)
            .context("invalid start date")?
            .and_utc(),
        None => end - Duration::days(days.max(1)),
    };

    if start >= end {
        bail!("start {} is not before end {}", start, end);
    }
    Ok((start, end))
}

async fn run_live(config: BotConfig) -> Result<()> {
    tracing::info!(
        "🚀 FutureBot live: {} {} x{}",
        config.trading.symbol,
        config.trading.interval,
        config.trading.leverage
    );

    let client = BinanceFuturesClient::new(config.source.clone())?;
    let (notifier, mut events) = StatusNotifier::channel(config.live.status_channel_capacity);
    let mut trader = LiveTrader::new(client, &config, notifier)?;

    let presenter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                StatusEvent::Log(line) => println!("{}", line),
                StatusEvent::Status {
                    score,
                    mark_price,
                    unrealized_pnl,
                } => println!(
                    "score {:+3} | mark {:.4} | uPnL {:+.2}",
                    score, mark_price, unrealized_pnl
                ),
            }
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Ctrl-C received, stopping after the current tick");
            stop_flag.store(true, Ordering::Relaxed);
        }
    });

    let live = tokio::spawn(async move {
        trader.run(stop).await;
        trader
    });
    let trader = live.await.context("live loop task failed")?;

    let ledger = trader.ledger();
    println!(
        "\nFinal balance {:.2} over {} trades",
        ledger.balance(),
        ledger.history().len()
    );
    for trade in ledger.history_recent_first().take(10) {
        println!(
            "  {} {} {} PnL {:+.2}",
            trade.exit_time.format("%Y-%m-%d %H:%M"),
            trade.direction.label(),
            trade.exit_reason,
            trade.realized_pnl
        );
    }

    drop(trader);
    presenter.await.ok();
    Ok(())
}

async fn run_backtests(
    config: BotConfig,
    symbols: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let client = Arc::new(BinanceFuturesClient::new(config.source.clone())?);
    let mut tasks = JoinSet::new();

    for symbol in symbols {
        let mut config = config.clone();
        config.trading.symbol = symbol.to_uppercase();
        let client = client.clone();

        tasks.spawn(async move { backtest_symbol(client, config, start, end).await });
    }

    let mut results: Vec<BacktestResult> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => tracing::error!("❌ Backtest failed: {:#}", e),
            Err(e) => tracing::error!("❌ Backtest task panicked: {}", e),
        }
    }

    results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    for result in &results {
        println!("{}", result.log_text());
        result.print_report();
    }

    Ok(())
}

async fn backtest_symbol(
    client: Arc<BinanceFuturesClient>,
    config: BotConfig,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<BacktestResult> {
    let symbol = config.trading.symbol.clone();
    let candles = client
        .fetch_range(&symbol, &config.trading.interval, start, end)
        .await
        .with_context(|| format!("fetching {} candles", symbol))?;
    tracing::info!("📊 {}: {} candles fetched", symbol, candles.len());

    let mut simulator = BacktestSimulator::new(&config)?;
    let result = tokio::task::spawn_blocking(move || simulator.run(&candles)).await?;
    Ok(result)
}
