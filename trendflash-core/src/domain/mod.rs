//! Domain types for trendflash

pub mod candle;
pub mod position;
pub mod signal;
pub mod trade;

pub use candle::{Candle, Resolution};
pub use position::{Position, PositionSide};
pub use signal::{Signal, SignalReason, SignalSide};
pub use trade::TradeRecord;
