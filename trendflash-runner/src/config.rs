//! Serializable strategy configuration.
//!
//! Loaded from TOML. Every field has a default, so a partial file (or an
//! empty one) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use trendflash_core::domain::Resolution;
use trendflash_core::engine::ReentryGuard;
use trendflash_core::indicators::{SupertrendPair, SupertrendParams};

/// Upper bound on `warm_up_candles`.
pub const MAX_WARM_UP_CANDLES: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce a run of the strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub market: String,
    /// Candle width in seconds.
    pub resolution_secs: u64,
    /// Candles fed to the indicators before any decision is made.
    pub warm_up_candles: usize,
    pub initial_balance: f64,
    pub reentry_guard: ReentryGuard,
    /// Supertrend producing the trend line.
    pub primary: SupertrendParams,
    /// Supertrend producing the stop line.
    pub stop: SupertrendParams,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            market: "BTCUSDT".to_string(),
            resolution_secs: 300,
            warm_up_candles: 40,
            initial_balance: 1_000_000.0,
            reentry_guard: ReentryGuard::SameCandle,
            primary: SupertrendParams::new(10, 3.0),
            stop: SupertrendParams::new(10, 2.0),
        }
    }
}

impl StrategyConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.trim().is_empty() {
            return Err(ConfigError::Invalid("market must not be empty".into()));
        }
        self.resolution()?;
        if !(1..=MAX_WARM_UP_CANDLES).contains(&self.warm_up_candles) {
            return Err(ConfigError::Invalid(format!(
                "warm_up_candles must be between 1 and {MAX_WARM_UP_CANDLES}, got {}",
                self.warm_up_candles
            )));
        }
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_balance must be finite and > 0, got {}",
                self.initial_balance
            )));
        }
        for (name, params) in [("primary", &self.primary), ("stop", &self.stop)] {
            if params.period == 0 {
                return Err(ConfigError::Invalid(format!("{name}.period must be >= 1")));
            }
            if !params.multiplier.is_finite() || params.multiplier <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}.multiplier must be finite and > 0, got {}",
                    params.multiplier
                )));
            }
        }
        Ok(())
    }

    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        Resolution::from_secs(self.resolution_secs).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "resolution_secs must be between 1 and {}, got {}",
                Resolution::MAX_SECS,
                self.resolution_secs
            ))
        })
    }

    pub fn trend_source(&self) -> SupertrendPair {
        SupertrendPair::new(self.primary, self.stop)
    }

    /// Content hash of the configuration (BLAKE3 over its JSON form).
    ///
    /// Two runs with identical configs share the same hash.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("StrategyConfig has only string, number, and enum fields");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
