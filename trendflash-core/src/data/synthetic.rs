//! Synthetic candles for offline runs, demos, and benches.
//!
//! Prices follow a slow sine cycle plus seeded noise. Each candle is a pure
//! function of `(seed, bucket index)`, so overlapping fetches agree and the
//! live poller can run on top of this source without a network.

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{CandleSource, DataError};
use crate::domain::{Candle, Resolution};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub seed: u64,
    pub base_price: f64,
    /// Cycle amplitude as a fraction of `base_price`.
    pub amplitude: f64,
    /// Candles per full sine cycle.
    pub cycle_candles: u64,
    /// Per-candle noise as a fraction of `base_price`.
    pub volatility: f64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            seed: 42,
            base_price: 30_000.0,
            amplitude: 0.1,
            cycle_candles: 200,
            volatility: 0.002,
        }
    }
}

impl SyntheticSource {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    fn rng_for(&self, bucket: i64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (bucket as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn close_at(&self, bucket: i64) -> f64 {
        let phase = TAU * bucket.rem_euclid(self.cycle_candles.max(1) as i64) as f64
            / self.cycle_candles.max(1) as f64;
        let noise: f64 = self.rng_for(bucket).gen_range(-1.0..1.0);
        self.base_price * (1.0 + self.amplitude * phase.sin() + self.volatility * noise)
    }

    /// The candle for the bucket starting at `open_time`.
    pub fn candle_at(&self, open_time: DateTime<Utc>, resolution: Resolution) -> Candle {
        let bucket = open_time.timestamp().div_euclid(resolution.secs() as i64);
        let open = self.close_at(bucket - 1);
        let close = self.close_at(bucket);

        let mut rng = self.rng_for(!bucket);
        let wick_up: f64 = rng.gen_range(0.0..1.0) * self.volatility * self.base_price;
        let wick_down: f64 = rng.gen_range(0.0..1.0) * self.volatility * self.base_price;
        let volume: f64 = rng.gen_range(500.0..1500.0);

        Candle::new(
            open_time,
            open,
            open.max(close) + wick_up,
            open.min(close) - wick_down,
            close,
            volume,
        )
    }
}

impl CandleSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        _market: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let mut t = resolution.align_down(start);
        if t < start {
            t += resolution.duration();
        }
        let mut candles = Vec::new();
        while t <= end {
            candles.push(self.candle_at(t, resolution));
            t += resolution.duration();
        }
        Ok(candles)
    }
}
