// Risk management module
pub mod engine;
pub mod volatility;

pub use engine::{ExitAction, ExitDecision, RiskEngine, RiskParameters, RiskPolicy, TrailingState};
pub use volatility::{estimated_stop_percent, interval_base_volatility, symbol_multiplier};
