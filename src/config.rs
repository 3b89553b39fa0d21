//! Layered configuration: serde defaults, then an optional TOML file, then
//! `FUTUREBOT__SECTION__KEY` environment variables.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::api::SourceConfig;
use crate::backtest::BacktestConfig;
use crate::execution::{FeeModel, LiveConfig, DEFAULT_FEE_RATE};
use crate::risk::RiskPolicy;
use crate::strategy::ScoringConfig;
use crate::Result;

/// Market and account the bot trades
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    pub interval: String,
    pub leverage: u32,
    pub initial_balance: f64,
    pub fee_rate: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: "15m".to_string(),
            leverage: 10,
            initial_balance: 10_000.0,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub trading: TradingConfig,
    pub scoring: ScoringConfig,
    pub risk: RiskPolicy,
    pub live: LiveConfig,
    pub backtest: BacktestConfig,
    pub source: SourceConfig,
}

impl BotConfig {
    /// Load config from `path` (if given) layered under the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        } else {
            builder = builder.add_source(File::with_name("futurebot").required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("FUTUREBOT").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.scoring.validate()?;
        Ok(config)
    }

    pub fn fee_model(&self) -> FeeModel {
        FeeModel::new(self.trading.fee_rate)
    }
}
