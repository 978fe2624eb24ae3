//! Average True Range (ATR), streaming.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Lookback: period (the first candle has no previous close, so the seed
//! window is candles 1..=period and ATR is ready on candle index `period`).

use super::{Indicator, IndicatorValue};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// True range of `candle` given the previous candle's close.
pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let h = candle.high;
    let l = candle.low;
    (h - l).max((h - prev_close).abs()).max((l - prev_close).abs())
}

impl Indicator for Atr {
    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, candle: &Candle) -> IndicatorValue {
        if candle.is_void() {
            return IndicatorValue::WarmingUp;
        }

        let prev_close = self.prev_close.replace(candle.close);
        let Some(prev_close) = prev_close else {
            return IndicatorValue::WarmingUp;
        };
        let tr = true_range(candle, prev_close);

        match self.value {
            Some(prev) => {
                let alpha = 1.0 / self.period as f64;
                self.value = Some(alpha * tr + (1.0 - alpha) * prev);
            }
            None => {
                self.seed_sum += tr;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }

        self.value.into()
    }
}
