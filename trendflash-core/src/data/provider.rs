//! Candle source traits and structured error types.
//!
//! `CandleSource` abstracts over historical data sources (Binance REST, CSV
//! files, synthetic data) so the drivers can swap implementations and mock
//! for tests. `CandleSubscription` is the live counterpart: a blocking
//! producer that pushes candles into a rendezvous channel.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::domain::{Candle, Resolution};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("market not found: {market}")]
    MarketNotFound { market: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped, retry in {retry_after_secs}s)")]
    CircuitBreakerTripped { retry_after_secs: u64 },

    #[error("resolution {secs}s is not supported by {provider}")]
    UnsupportedResolution { provider: String, secs: u64 },

    #[error("invalid time range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("subscription failed after {failures} consecutive errors: {last}")]
    SubscriptionFailed { failures: u32, last: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Historical candle source.
pub trait CandleSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch candles whose open time lies in `[start, end]`, oldest first.
    fn fetch(
        &self,
        market: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError>;
}

impl<S: CandleSource + ?Sized> CandleSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        market: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        (**self).fetch(market, resolution, start, end)
    }
}

/// Live candle subscription.
///
/// `run` blocks the calling thread, sending every completed candle with an
/// open time after `after` into `tx`, in order. `tx` is a rendezvous
/// channel: each send waits for the consumer. Returns `Ok(())` when
/// `cancel` is set or the consumer hangs up.
pub trait CandleSubscription: Send {
    fn run(
        &mut self,
        market: &str,
        resolution: Resolution,
        after: DateTime<Utc>,
        tx: SyncSender<Candle>,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), DataError>;
}

/// Check that every candle is sane and the series is strictly increasing
/// in time.
///
/// Gaps are tolerated but logged, since the indicators assume a gap-free
/// stream.
pub fn check_ordering(candles: &[Candle], resolution: Resolution) -> Result<(), DataError> {
    if let Some(bad) = candles.iter().find(|c| !c.is_sane()) {
        return Err(DataError::Validation(format!("malformed candle: {bad}")));
    }
    for pair in candles.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.open_time <= prev.open_time {
            return Err(DataError::Validation(format!(
                "candles out of order: {} followed by {}",
                prev.open_time, next.open_time
            )));
        }
        if next.open_time - prev.open_time != resolution.duration() {
            warn!(
                prev = %prev.open_time,
                next = %next.open_time,
                "gap in candle series"
            );
        }
    }
    Ok(())
}
