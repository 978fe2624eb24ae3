//! Binance spot klines provider.
//!
//! Fetches OHLCV candles from the public `/api/v3/klines` endpoint. Handles
//! pagination (1000 candles per request), rate limiting, retries with
//! exponential backoff, response parsing, and the circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{check_ordering, CandleSource, DataError};
use crate::domain::{Candle, Resolution};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Maximum candles Binance returns per klines request.
const PAGE_LIMIT: usize = 1000;

/// Binance error body, e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

pub struct BinanceProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, circuit_breaker)
    }

    pub fn with_base_url(base_url: impl Into<String>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("trendflash/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    fn tripped(&self) -> DataError {
        DataError::CircuitBreakerTripped {
            retry_after_secs: self.circuit_breaker.remaining_cooldown().as_secs(),
        }
    }

    /// Kline interval name for a resolution.
    pub fn interval(resolution: Resolution) -> Result<&'static str, DataError> {
        let name = match resolution.secs() {
            60 => "1m",
            180 => "3m",
            300 => "5m",
            900 => "15m",
            1800 => "30m",
            3600 => "1h",
            7200 => "2h",
            14400 => "4h",
            21600 => "6h",
            43200 => "12h",
            86400 => "1d",
            secs => {
                return Err(DataError::UnsupportedResolution {
                    provider: "binance".into(),
                    secs,
                })
            }
        };
        Ok(name)
    }

    fn klines_url(&self, market: &str, interval: &str, start_ms: i64, end_ms: i64) -> String {
        format!(
            "{}/api/v3/klines?symbol={market}&interval={interval}\
             &startTime={start_ms}&endTime={end_ms}&limit={PAGE_LIMIT}",
            self.base_url
        )
    }

    /// Parse a klines response body into candles.
    ///
    /// Each row is `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
    pub fn parse_klines(rows: &[Value]) -> Result<Vec<Candle>, DataError> {
        rows.iter().map(parse_row).collect()
    }

    fn fetch_page(&self, market: &str, url: &str) -> Result<Vec<Candle>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(self.tripped());
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(self.tripped());
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, error = %e, "klines request failed");
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            // 418 is Binance's IP ban after ignoring 429s
            if status == reqwest::StatusCode::FORBIDDEN || status.as_u16() == 418 {
                self.circuit_breaker.trip();
                return Err(self.tripped());
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::BAD_REQUEST {
                let body: Option<ApiError> = resp.json().ok();
                return Err(match body {
                    Some(err) if err.code == -1121 => DataError::MarketNotFound {
                        market: market.to_string(),
                    },
                    Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.msg)),
                    None => DataError::Other(format!("HTTP 400 for {market}")),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {market}")));
                continue;
            }

            let rows: Vec<Value> = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse klines for {market}: {e}"))
            })?;

            let candles = Self::parse_klines(&rows)?;
            self.circuit_breaker.record_success();
            return Ok(candles);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn parse_row(row: &Value) -> Result<Candle, DataError> {
    let malformed = || DataError::ResponseFormatChanged(format!("malformed kline row: {row}"));

    let arr = row.as_array().filter(|a| a.len() >= 6).ok_or_else(malformed)?;
    let open_time_ms = arr[0].as_i64().ok_or_else(malformed)?;
    let open_time = DateTime::<Utc>::from_timestamp_millis(open_time_ms).ok_or_else(malformed)?;

    let num = |i: usize| -> Result<f64, DataError> {
        arr[i]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(malformed)
    };

    Ok(Candle {
        open_time,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

impl CandleSource for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch(
        &self,
        market: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let interval = Self::interval(resolution)?;
        let end_ms = end.timestamp_millis();
        paginate(start.timestamp_millis(), end_ms, resolution, |cursor_ms| {
            let url = self.klines_url(market, interval, cursor_ms, end_ms);
            let page = self.fetch_page(market, &url)?;
            debug!(market, interval, count = page.len(), "fetched klines page");
            Ok(page)
        })
    }
}

/// Walk pages from `start_ms` until a short page or `end_ms`, then check the
/// stitched series.
fn paginate<F>(
    start_ms: i64,
    end_ms: i64,
    resolution: Resolution,
    mut fetch_page: F,
) -> Result<Vec<Candle>, DataError>
where
    F: FnMut(i64) -> Result<Vec<Candle>, DataError>,
{
    let step_ms = resolution.duration().num_milliseconds();
    let mut cursor_ms = start_ms;
    let mut candles: Vec<Candle> = Vec::new();

    while cursor_ms <= end_ms {
        let page = fetch_page(cursor_ms)?;
        let Some(last) = page.last() else { break };
        cursor_ms = last.open_time.timestamp_millis() + step_ms;
        let full = page.len() == PAGE_LIMIT;
        candles.extend(page);
        if !full {
            break;
        }
    }

    check_ordering(&candles, resolution)?;
    Ok(candles)
}
