//! Candle: the fundamental market data unit.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candle for one fixed-width time bucket.
///
/// Candles are produced by a candle source and never mutated afterwards.
/// A stream of candles is expected to be strictly increasing in `open_time`
/// and gap-free for the configured [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is not a finite number.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// Midpoint of the candle's range, `(high + low) / 2`.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

impl fmt::Display for Candle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} O:{:.2} H:{:.2} L:{:.2} C:{:.2} V:{:.2}",
            self.open_time.format("%Y-%m-%d %H:%M:%S"),
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume
        )
    }
}

/// Candle width in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Resolution(u64);

impl Resolution {
    /// Widest supported candle: 31 days.
    pub const MAX_SECS: u64 = 31 * 86_400;

    /// Create a resolution. Returns `None` outside `1..=MAX_SECS`.
    pub fn from_secs(secs: u64) -> Option<Self> {
        (1..=Self::MAX_SECS).contains(&secs).then_some(Self(secs))
    }

    pub fn secs(&self) -> u64 {
        self.0
    }

    pub fn duration(&self) -> chrono::Duration {
        // bounded by MAX_SECS, so the cast and the conversion cannot overflow
        chrono::Duration::seconds(self.0 as i64)
    }

    /// Start of the bucket containing `t`.
    pub fn align_down(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let ts = t.timestamp();
        let step = self.0 as i64;
        let aligned = ts - ts.rem_euclid(step);
        Utc.timestamp_opt(aligned, 0).single().unwrap_or(t)
    }
}

impl TryFrom<u64> for Resolution {
    type Error = String;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::from_secs(secs).ok_or_else(|| {
            format!(
                "resolution must be between 1 and {} seconds, got {secs}",
                Self::MAX_SECS
            )
        })
    }
}

impl From<Resolution> for u64 {
    fn from(r: Resolution) -> u64 {
        r.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
