use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::source::CandleSource;
use crate::error::Error;
use crate::models::{normalize_candles, Candle};
use crate::Result;

const BINANCE_FUTURES_BASE: &str = "https://fapi.binance.com";
const KLINES_PATH: &str = "/fapi/v1/klines";

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Candle source settings (the `[source]` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub requests_per_second: u32,
    /// Bars per page, capped by the exchange at 1500
    pub page_limit: usize,
    /// Fixed pause between history pages
    pub page_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_FUTURES_BASE.to_string(),
            requests_per_second: 5,
            page_limit: 1000,
            page_delay_ms: 250,
            timeout_secs: 10,
        }
    }
}

/// Binance USDT-M futures klines client
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    config: SourceConfig,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceFuturesClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// One klines request
    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), KLINES_PATH);

        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = start {
            query.push(("startTime", start.timestamp_millis().to_string()));
        }
        if let Some(end) = end {
            query.push(("endTime", end.timestamp_millis().to_string()));
        }

        self.rate_limiter.until_ready().await;
        let response = self.client.get(&url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

impl CandleSource for BinanceFuturesClient {
    async fn fetch_latest(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        self.get_klines(symbol, interval, limit, None, None).await
    }

    /// Paginated history. A failed page ends the fetch with what was collected so far.
    async fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let mut candles = Vec::new();
        let mut cursor = start;
        let mut page = 0usize;

        while cursor <= end {
            if page > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }
            page += 1;

            let batch = match self
                .get_klines(symbol, interval, self.config.page_limit, Some(cursor), Some(end))
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(
                        "{} {} page {} failed, keeping {} candles: {}",
                        symbol,
                        interval,
                        page,
                        candles.len(),
                        e
                    );
                    break;
                }
            };

            let Some(last) = batch.last() else {
                break;
            };
            let next = last.timestamp + chrono::Duration::milliseconds(1);
            let full_page = batch.len() >= self.config.page_limit;

            candles.extend(batch);
            tracing::debug!("{} {} page {}: {} candles total", symbol, interval, page, candles.len());

            if !full_page || next <= cursor {
                break;
            }
            cursor = next;
        }

        Ok(normalize_candles(candles))
    }
}

/// Kline row: `[openTime, "open", "high", "low", "close", "volume", closeTime, quoteVolume, trades, ...]`
fn parse_kline(row: &[Value]) -> Result<Candle> {
    let malformed = || Error::MalformedCandle(Value::Array(row.to_vec()).to_string());

    let open_time = row.first().and_then(Value::as_i64).ok_or_else(malformed)?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time).ok_or_else(malformed)?;

    let price = |index: usize| -> Result<f64> {
        match row.get(index) {
            Some(Value::String(s)) => s.parse::<f64>().map_err(|_| malformed()),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(malformed),
            _ => Err(malformed()),
        }
    };

    Ok(Candle {
        timestamp,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
        volume: price(5)?,
        trade_count: row.get(8).and_then(Value::as_u64).unwrap_or(0),
    })
}
