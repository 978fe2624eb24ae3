//! Errors from the backtest and live drivers.

use thiserror::Error;

use trendflash_core::data::DataError;
use trendflash_core::engine::EngineError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("insufficient history: need more than {needed} candles for warm-up, got {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("live subscription ended unexpectedly")]
    SubscriptionEnded,

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}
