//! Streaming indicators and the trend source the decision engine reads.
//!
//! Indicators consume one candle at a time, in strictly increasing time
//! order, and report [`IndicatorValue::WarmingUp`] until they have enough
//! history. The decision engine never sees raw indicators; it sees a
//! [`TrendReading`] produced by a [`TrendSource`].

pub mod atr;
pub mod supertrend;

pub use atr::Atr;
pub use supertrend::{Supertrend, SupertrendParams};

use crate::domain::Candle;
use serde::{Deserialize, Serialize};

/// An indicator level, or the warm-up sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IndicatorValue {
    /// Insufficient history: no decision may be made on this candle.
    WarmingUp,
    Ready(f64),
}

impl IndicatorValue {
    pub fn value(self) -> Option<f64> {
        match self {
            IndicatorValue::Ready(v) => Some(v),
            IndicatorValue::WarmingUp => None,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, IndicatorValue::Ready(_))
    }

    pub fn is_warming_up(self) -> bool {
        !self.is_ready()
    }
}

impl From<Option<f64>> for IndicatorValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(IndicatorValue::WarmingUp, IndicatorValue::Ready)
    }
}

/// Trait for streaming indicators.
///
/// # Look-ahead contamination guard
/// `update` sees one candle at a time, so the value for candle t can only
/// depend on candles up to and including t.
pub trait Indicator: Send {
    /// Number of candles consumed before the indicator produces a value.
    fn lookback(&self) -> usize;

    /// Consume the next candle and return the value for it.
    fn update(&mut self, candle: &Candle) -> IndicatorValue;
}

/// The two values the decision engine reads for each candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    /// Primary trend line used for entry/exit crossovers.
    pub trend: IndicatorValue,
    /// Secondary line used as the dynamic stop.
    pub stop: IndicatorValue,
}

impl TrendReading {
    pub fn new(trend: IndicatorValue, stop: IndicatorValue) -> Self {
        Self { trend, stop }
    }

    pub fn ready(trend: f64, stop: f64) -> Self {
        Self::new(IndicatorValue::Ready(trend), IndicatorValue::Ready(stop))
    }
}

/// Stateful producer of [`TrendReading`]s, called exactly once per candle.
pub trait TrendSource: Send {
    fn update(&mut self, candle: &Candle) -> TrendReading;

    /// Candles needed before both readings can be ready.
    fn lookback(&self) -> usize;
}

/// Primary Supertrend as the trend line, a second Supertrend as the stop line.
#[derive(Debug, Clone)]
pub struct SupertrendPair {
    trend: Supertrend,
    stop: Supertrend,
}

impl SupertrendPair {
    pub fn new(trend: SupertrendParams, stop: SupertrendParams) -> Self {
        Self {
            trend: Supertrend::from_params(trend),
            stop: Supertrend::from_params(stop),
        }
    }
}

impl TrendSource for SupertrendPair {
    fn update(&mut self, candle: &Candle) -> TrendReading {
        TrendReading::new(self.trend.update(candle), self.stop.update(candle))
    }

    fn lookback(&self) -> usize {
        self.trend.lookback().max(self.stop.lookback())
    }
}

/// Create synthetic candles from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    let data: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_candles(&data)
}

/// Create five-minute candles from `(open, high, low, close)` tuples.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Candle::new(
                base + chrono::Duration::minutes(5 * i as i64),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
