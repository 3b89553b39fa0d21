pub mod metrics;
pub mod report;
pub mod runner;
pub mod synthetic;

pub use metrics::{BacktestResult, DrawdownTracker, EquityPoint};
pub use report::{trade_log_path, write_trade_log, ReportLog, BANKRUPT_MARKER, NOT_ENOUGH_DATA};
pub use runner::{BacktestConfig, BacktestSimulator};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
