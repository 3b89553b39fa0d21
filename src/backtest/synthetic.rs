use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Mean-reverting chop around the starting price
    Sideways,
    /// Large swings (±5% per bar)
    Volatile,
    /// Every 50th bar missing
    WithGaps,
    /// Quiet first half, then a 60% collapse with long lower wicks
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 6] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::WithGaps,
        MarketScenario::Crash,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::WithGaps => "with-gaps",
            MarketScenario::Crash => "crash",
        }
    }
}

/// Generates synthetic futures bars for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000.0,
            start_time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of bar slots (gaps leave some empty)
    /// * `interval_minutes` - Minutes between candles
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let bars_per_day = 24.0 * 60.0 / interval_minutes.max(1) as f64;
        let base = self.base_price;
        let half = num_candles / 2;

        let mut candles = Vec::with_capacity(num_candles);
        let mut price = base;

        for i in 0..num_candles {
            if scenario == MarketScenario::WithGaps && i % 50 == 49 {
                continue;
            }

            let open = price;
            price = match scenario {
                MarketScenario::Uptrend => {
                    price * (1.0 + 0.02 / bars_per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Downtrend => {
                    price * (1.0 - 0.02 / bars_per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Sideways => {
                    price + (base - price) * 0.1 + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => {
                    (price * (1.0 + self.rng.gen_range(-0.05..0.05))).max(base * 0.5)
                }
                MarketScenario::WithGaps => price * (1.0 + self.rng.gen_range(-0.01..0.01)),
                MarketScenario::Crash if i < half => {
                    price * (1.0 + self.rng.gen_range(-0.002..0.002))
                }
                MarketScenario::Crash => {
                    let drop = 0.6 / (num_candles - half).max(1) as f64;
                    price * (1.0 - drop * 2.0 * self.rng.gen_range(0.0..1.0))
                }
            };

            let wick = if scenario == MarketScenario::Crash && i >= half {
                0.03
            } else {
                0.002
            };
            let timestamp = self.start_time + Duration::minutes(i as i64 * interval_minutes);
            candles.push(self.create_candle(open, price, wick, timestamp));
        }

        candles
    }

    /// Build a bar from open/close, with random wicks up to `wick` of price
    fn create_candle(&mut self, open: f64, close: f64, wick: f64, timestamp: DateTime<Utc>) -> Candle {
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..0.002));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick));

        // Vary volume ±30%, trade count tracks volume
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);
        let trade_count = (volume / 10.0).round() as u64;

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            trade_count,
        }
    }
}
