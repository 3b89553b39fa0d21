use std::future::Future;

use chrono::{DateTime, Utc};

use crate::models::{normalize_candles, Candle};
use crate::Result;

/// Supplier of ordered OHLCV bars
pub trait CandleSource: Send + Sync {
    /// Most recent `limit` bars, the last one still forming
    fn fetch_latest(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// All bars opening in `[start, end]`, sorted and deduplicated
    fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

/// Candles held in memory (synthetic runs and tests)
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    candles: Vec<Candle>,
}

impl MemorySource {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: normalize_candles(candles),
        }
    }
}

impl CandleSource for MemorySource {
    async fn fetch_latest(&self, _symbol: &str, _interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }

    async fn fetch_range(
        &self,
        _symbol: &str,
        _interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        Ok(self
            .candles
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp <= end)
            .cloned()
            .collect())
    }
}
