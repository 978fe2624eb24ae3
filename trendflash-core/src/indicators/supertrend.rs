//! Supertrend: ATR-based directional indicator, streaming.
//!
//! Inherently sequential/stateful: direction flips between support and resistance
//! based on close vs band comparisons.
//!
//! Lookback: atr_period (same as ATR lookback since it depends on ATR).
//!
//! Output: the active band value: lower band (support) when trending up,
//! upper band (resistance) when trending down.

use serde::{Deserialize, Serialize};

use super::atr::Atr;
use super::{Indicator, IndicatorValue};
use crate::domain::Candle;

/// Supertrend parameters as they appear in strategy config files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendParams {
    pub period: usize,
    pub multiplier: f64,
}

impl SupertrendParams {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bands {
    upper: f64,
    lower: f64,
    trending_up: bool,
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    multiplier: f64,
    atr: Atr,
    prev_close: Option<f64>,
    bands: Option<Bands>,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self {
            multiplier,
            atr: Atr::new(period),
            prev_close: None,
            bands: None,
        }
    }

    pub fn from_params(params: SupertrendParams) -> Self {
        Self::new(params.period, params.multiplier)
    }
}

impl Indicator for Supertrend {
    fn lookback(&self) -> usize {
        self.atr.period()
    }

    fn update(&mut self, candle: &Candle) -> IndicatorValue {
        if candle.is_void() {
            return IndicatorValue::WarmingUp;
        }

        let atr = self.atr.update(candle);
        let prev_close = self.prev_close.replace(candle.close);
        let Some(atr) = atr.value() else {
            return IndicatorValue::WarmingUp;
        };

        let hl2 = candle.hl2();
        let basic_upper = hl2 + self.multiplier * atr;
        let basic_lower = hl2 - self.multiplier * atr;

        let bands = match (self.bands, prev_close) {
            (Some(prev), Some(prev_close)) => {
                // Upper band: can only decrease (tighten resistance)
                let upper = if prev_close <= prev.upper {
                    basic_upper.min(prev.upper)
                } else {
                    basic_upper
                };
                // Lower band: can only increase (tighten support)
                let lower = if prev_close >= prev.lower {
                    basic_lower.max(prev.lower)
                } else {
                    basic_lower
                };

                let mut trending_up = prev.trending_up;
                if trending_up && candle.close < lower {
                    trending_up = false;
                } else if !trending_up && candle.close > upper {
                    trending_up = true;
                }

                Bands {
                    upper,
                    lower,
                    trending_up,
                }
            }
            // First ready candle: start trending up (support)
            _ => Bands {
                upper: basic_upper,
                lower: basic_lower,
                trending_up: true,
            },
        };
        self.bands = Some(bands);

        let level = if bands.trending_up {
            bands.lower
        } else {
            bands.upper
        };
        IndicatorValue::Ready(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_candles;

    #[test]
    fn supertrend_uptrend_below_price() {
        // In an uptrend, supertrend (lower band) should be below the close
        let mut data = Vec::new();
        for i in 0..15 {
            let base = 100.0 + i as f64 * 2.0;
            data.push((base - 1.0, base + 3.0, base - 3.0, base + 1.0));
        }
        let candles = make_ohlc_candles(&data);
        let mut st = Supertrend::new(3, 2.0);

        for (i, candle) in candles.iter().enumerate() {
            let value = st.update(candle);
            if i >= 5 {
                let level = value.value().expect("ready after warm-up");
                assert!(
                    level < candle.close,
                    "supertrend ({level}) should be below close ({}) at candle {i} in uptrend",
                    candle.close
                );
            }
        }
    }

    #[test]
    fn supertrend_downtrend_above_price() {
        // In a downtrend, supertrend (upper band) should be above the close
        let mut data = Vec::new();
        for i in 0..15 {
            let base = 200.0 - i as f64 * 3.0;
            data.push((base + 1.0, base + 3.0, base - 3.0, base - 1.0));
        }
        let candles = make_ohlc_candles(&data);
        let mut st = Supertrend::new(3, 2.0);

        let mut found_above = false;
        for (i, candle) in candles.iter().enumerate() {
            if let Some(level) = st.update(candle).value() {
                if i >= 5 && level > candle.close {
                    found_above = true;
                }
            }
        }
        assert!(
            found_above,
            "supertrend should be above close at some point in a downtrend"
        );
    }

    #[test]
    fn supertrend_first_value_is_lower_band() {
        let candles = make_ohlc_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // TR = 8, ATR(1) = 8
        ]);
        let mut st = Supertrend::new(1, 2.0);
        assert!(st.update(&candles[0]).is_warming_up());
        // hl2 = 104, lower = 104 - 2*8 = 88
        assert_eq!(st.update(&candles[1]), IndicatorValue::Ready(88.0));
    }

    #[test]
    fn supertrend_lookback() {
        assert_eq!(Supertrend::new(14, 3.0).lookback(), 14);
    }

    #[test]
    fn supertrend_too_few_candles() {
        let candles = make_ohlc_candles(&[(100.0, 105.0, 95.0, 102.0)]);
        let mut st = Supertrend::new(3, 2.0);
        assert!(candles.iter().all(|c| st.update(c).is_warming_up()));
    }
}
