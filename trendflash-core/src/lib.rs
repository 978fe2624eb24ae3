//! trendflash core: candles, streaming indicators, the decision engine, and candle sources.
//!
//! This crate contains the heart of the signal engine:
//! - Domain types (candles, positions, signals, trade records)
//! - Streaming ATR and Supertrend indicators behind the `TrendSource` seam
//! - The per-candle decision state machine with its position ledger
//! - The signal sink seam
//! - Historical and live candle sources

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
