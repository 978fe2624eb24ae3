//! Decision engine: per-candle state machine, position bookkeeping, and
//! the signal sink seam.
//!
//! The engine is a pure function of `(candle, trend reading, state)`. The
//! drivers in `trendflash-runner` own the state and forward the returned
//! signals and events.

pub mod decision;
pub mod sink;
pub mod state;
pub mod warmup;

pub use decision::{Decision, DecisionEngine, EngineEvent, ReentryGuard};
pub use sink::{SignalSink, SinkError};
pub use state::{EngineError, EngineState};
pub use warmup::WarmupState;
