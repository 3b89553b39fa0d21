use anyhow::Result;
use futurebot::backtest::{BacktestResult, BacktestSimulator, MarketScenario, SyntheticDataGenerator};
use futurebot::config::BotConfig;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("futurebot=info")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          FUTUREBOT SYNTHETIC BACKTEST SUITE           ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let mut config = BotConfig::load(None)?;
    config.trading.symbol = "SYNTHUSDT".to_string();
    config.trading.interval = "5m".to_string();
    config.backtest.write_trade_log = false;

    let mut all_results = Vec::new();

    for scenario in MarketScenario::ALL {
        let mut generator = SyntheticDataGenerator::new(42).with_base_price(2_000.0);
        let candles = generator.generate(scenario, 1_000, 5);

        let mut simulator = BacktestSimulator::new(&config)?;
        let result = simulator.run(&candles);
        result.print_report();
        all_results.push((scenario.name(), result));
    }

    print_summary_comparison(&all_results);

    Ok(())
}

fn print_summary_comparison(results: &[(&str, BacktestResult)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<14} {:>10} {:>10} {:>8} {:>8} {:>8}",
        "Scenario", "P&L", "Return%", "Trades", "Win%", "MaxDD%"
    );
    println!("{}", "─".repeat(62));

    for (name, result) in results {
        println!(
            "{:<14} {:>10.2} {:>10.2} {:>8} {:>8.1} {:>8.2}{}",
            name,
            result.total_pnl,
            result.return_percent(),
            result.total_trades(),
            result.win_rate(),
            result.max_drawdown_percent,
            if result.bankrupt { "  💀" } else { "" }
        );
    }

    println!("\n");
}
